//! In-process store for tests and single-node development.

use super::{RequestStore, StoreError};
use crate::entities::acceptance::ProfessionalAcceptance;
use crate::entities::idempotency::IdempotencyRecord;
use crate::lifecycle::RequestAggregate;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

type KeyId = (Uuid, Uuid, String);

fn key_id(record: &IdempotencyRecord) -> KeyId {
    (record.scope, record.actor_id, record.key.clone())
}

#[derive(Default)]
struct State {
    requests: HashMap<Uuid, RequestAggregate>,
    keys: HashMap<KeyId, IdempotencyRecord>,
}

impl State {
    fn check_key(&self, key: Option<&IdempotencyRecord>) -> Result<(), StoreError> {
        match key {
            Some(record) if self.keys.contains_key(&key_id(record)) => {
                Err(StoreError::KeyTaken {
                    key: record.key.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn record_key(&mut self, key: Option<&IdempotencyRecord>) {
        if let Some(record) = key {
            self.keys.insert(key_id(record), record.clone());
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn load(&self, request_id: Uuid) -> Result<Option<RequestAggregate>, StoreError> {
        Ok(self.state.read().await.requests.get(&request_id).cloned())
    }

    async fn insert(
        &self,
        aggregate: &RequestAggregate,
        key: Option<&IdempotencyRecord>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.check_key(key)?;
        if state.requests.contains_key(&aggregate.id()) {
            return Err(StoreError::VersionConflict(aggregate.id()));
        }
        state.requests.insert(aggregate.id(), aggregate.clone());
        state.record_key(key);
        Ok(())
    }

    async fn commit(
        &self,
        aggregate: &RequestAggregate,
        expected_version: i64,
        key: Option<&IdempotencyRecord>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let current = state
            .requests
            .get(&aggregate.id())
            .map(|stored| stored.request.version);
        if current != Some(expected_version) {
            return Err(StoreError::VersionConflict(aggregate.id()));
        }
        state.check_key(key)?;
        state.requests.insert(aggregate.id(), aggregate.clone());
        state.record_key(key);
        Ok(())
    }

    async fn idempotency_record(
        &self,
        scope: Uuid,
        actor_id: Uuid,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .keys
            .get(&(scope, actor_id, key.to_string()))
            .cloned())
    }

    async fn acceptances_by_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<ProfessionalAcceptance>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<ProfessionalAcceptance> = state
            .requests
            .values()
            .filter_map(|aggregate| {
                aggregate
                    .ledger
                    .find(professional_id)
                    .map(|row| ProfessionalAcceptance {
                        id: row.id,
                        request_id: row.request_id,
                        accepted_at: row.accepted_at,
                        outcome: row.outcome,
                        request_status: aggregate.status(),
                    })
            })
            .collect();
        rows.sort_by(|a, b| b.accepted_at.cmp(&a.accepted_at));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecyclePolicy;
    use crate::entities::Urgency;
    use crate::entities::service_request::RequestDetails;
    use time::OffsetDateTime;

    fn aggregate() -> RequestAggregate {
        RequestAggregate::create(
            Uuid::now_v7(),
            RequestDetails {
                category: "cleaning".to_string(),
                description: "End of tenancy clean".to_string(),
                location: "Flat 3, 9 Elm Street".to_string(),
                urgency: Urgency::Low,
            },
            OffsetDateTime::now_utc(),
            &LifecyclePolicy::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_version() {
        let store = MemoryStore::new();
        let mut agg = aggregate();
        store.insert(&agg, None).await.unwrap();

        agg.request.version = 1;
        store.commit(&agg, 0, None).await.unwrap();

        agg.request.version = 2;
        let err = store.commit(&agg, 0, None).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict(id) if id == agg.id()));
        let stored = store.load(agg.id()).await.unwrap().unwrap();
        assert_eq!(stored.request.version, 1);
    }

    #[tokio::test]
    async fn test_key_is_recorded_once() {
        let store = MemoryStore::new();
        let agg = aggregate();
        let client = agg.request.client_id;
        let record = IdempotencyRecord::new(
            client,
            client,
            "k-1",
            "create_request",
            "fp",
            agg.id(),
            OffsetDateTime::now_utc(),
        );
        store.insert(&agg, Some(&record)).await.unwrap();
        let found = store.idempotency_record(client, client, "k-1").await.unwrap();
        assert_eq!(found, Some(record.clone()));
        // Another caller under the same scope has its own namespace.
        let stranger = store
            .idempotency_record(client, Uuid::now_v7(), "k-1")
            .await
            .unwrap();
        assert!(stranger.is_none());

        let other = aggregate();
        let err = store.insert(&other, Some(&record)).await.unwrap_err();
        assert!(matches!(err, StoreError::KeyTaken { .. }));
        assert!(store.load(other.id()).await.unwrap().is_none());
    }
}
