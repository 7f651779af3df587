//! Postgres-backed store.
//!
//! Each commit runs in one transaction: the versioned request update, the
//! ledger upserts and the idempotency key either all land or none do.

use super::{RequestStore, StoreError};
use crate::entities::acceptance::{
    Acceptance, ListAcceptancesByProfessional, ProfessionalAcceptance,
};
use crate::entities::idempotency::{GetIdempotencyRecord, IdempotencyRecord};
use crate::entities::service_request::ServiceRequest;
use crate::framework::{DatabaseAccessor, DatabaseProcessor, TransactionProcessor};
use crate::ledger::AcceptanceLedger;
use crate::lifecycle::RequestAggregate;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use uuid::Uuid;

const IDEMPOTENCY_PKEY: &str = "idempotency_keys_pkey";

pub struct PostgresStore {
    db: DatabaseProcessor,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor::new(pool),
        }
    }

    async fn write_ledger(
        tx: &mut TransactionProcessor<'_>,
        ledger: &AcceptanceLedger,
    ) -> Result<(), sqlx::Error> {
        for row in ledger.list() {
            Acceptance::upsert(tx, row).await?;
        }
        Ok(())
    }
}

/// Unique violations mean a concurrent writer got there first.
fn classify(err: sqlx::Error, request_id: Uuid, key: Option<&IdempotencyRecord>) -> StoreError {
    let on_key = err
        .as_database_error()
        .filter(|db_err| db_err.is_unique_violation())
        .map(|db_err| db_err.constraint() == Some(IDEMPOTENCY_PKEY));
    match (on_key, key) {
        (Some(true), Some(record)) => StoreError::KeyTaken {
            key: record.key.clone(),
        },
        (Some(_), _) => StoreError::VersionConflict(request_id),
        (None, _) => StoreError::from(err),
    }
}

#[async_trait]
impl RequestStore for PostgresStore {
    async fn load(&self, request_id: Uuid) -> Result<Option<RequestAggregate>, StoreError> {
        // One snapshot for the row and its ledger.
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(tx.acquire())
            .await?;
        let Some(request) = ServiceRequest::find(&mut tx, request_id).await? else {
            return Ok(None);
        };
        let rows = Acceptance::list_for_request(&mut tx, request_id).await?;
        tx.commit().await?;
        Ok(Some(RequestAggregate {
            request,
            ledger: AcceptanceLedger::from_rows(request_id, rows),
        }))
    }

    async fn insert(
        &self,
        aggregate: &RequestAggregate,
        key: Option<&IdempotencyRecord>,
    ) -> Result<(), StoreError> {
        let request_id = aggregate.id();
        let mut tx = self.db.begin().await?;
        let written: Result<(), sqlx::Error> = async {
            ServiceRequest::insert(&mut tx, &aggregate.request).await?;
            if let Some(record) = key {
                IdempotencyRecord::insert(&mut tx, record).await?;
            }
            Ok(())
        }
        .await;
        written.map_err(|e| classify(e, request_id, key))?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit(
        &self,
        aggregate: &RequestAggregate,
        expected_version: i64,
        key: Option<&IdempotencyRecord>,
    ) -> Result<(), StoreError> {
        let request_id = aggregate.id();
        let mut tx = self.db.begin().await?;

        let updated =
            ServiceRequest::update_versioned(&mut tx, &aggregate.request, expected_version)
                .await
                .map_err(|e| classify(e, request_id, key))?;
        if !updated {
            return Err(StoreError::VersionConflict(request_id));
        }

        let written: Result<(), sqlx::Error> = async {
            Self::write_ledger(&mut tx, &aggregate.ledger).await?;
            if let Some(record) = key {
                IdempotencyRecord::insert(&mut tx, record).await?;
            }
            Ok(())
        }
        .await;
        written.map_err(|e| classify(e, request_id, key))?;

        tx.commit().await?;
        Ok(())
    }

    async fn idempotency_record(
        &self,
        scope: Uuid,
        actor_id: Uuid,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let record = self
            .db
            .process(GetIdempotencyRecord {
                scope,
                actor_id,
                key: key.to_string(),
            })
            .await?;
        Ok(record)
    }

    async fn acceptances_by_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<ProfessionalAcceptance>, StoreError> {
        let rows = self
            .db
            .process(ListAcceptancesByProfessional { professional_id })
            .await?;
        Ok(rows)
    }
}
