//! Durable storage of request aggregates.
//!
//! Both backends enforce the same contract: `commit` succeeds only if the
//! stored version still equals the version the caller loaded, and an
//! idempotency key is written in the same atomic step as the transition it
//! belongs to.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::entities::acceptance::ProfessionalAcceptance;
use crate::entities::idempotency::IdempotencyRecord;
use crate::lifecycle::RequestAggregate;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Someone else committed this request since it was loaded.
    #[error("request {0} was modified concurrently")]
    VersionConflict(Uuid),

    /// The idempotency key was recorded by a concurrent call.
    #[error("idempotency key {key:?} is already recorded")]
    KeyTaken { key: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    /// Failures worth retrying unchanged after a short pause.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn load(&self, request_id: Uuid) -> Result<Option<RequestAggregate>, StoreError>;

    /// Persist a freshly created aggregate, with the create call's key.
    async fn insert(
        &self,
        aggregate: &RequestAggregate,
        key: Option<&IdempotencyRecord>,
    ) -> Result<(), StoreError>;

    /// Persist a transition. `aggregate.request.version` must already be
    /// `expected_version + 1`.
    async fn commit(
        &self,
        aggregate: &RequestAggregate,
        expected_version: i64,
        key: Option<&IdempotencyRecord>,
    ) -> Result<(), StoreError>;

    /// The key `actor_id` recorded under `scope`, if any.
    async fn idempotency_record(
        &self,
        scope: Uuid,
        actor_id: Uuid,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError>;

    async fn acceptances_by_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<ProfessionalAcceptance>, StoreError>;
}
