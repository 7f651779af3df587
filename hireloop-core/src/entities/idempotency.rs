use crate::framework::{DatabaseAccessor, DatabaseProcessor};
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

/// A client-supplied idempotency key that has already been applied.
///
/// Keys belong to `(scope, actor_id)`. `scope` is the request id for
/// operations on an existing request and the client id for
/// `create_request`; `actor_id` is the caller, so two callers never share a
/// key namespace.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IdempotencyRecord {
    pub scope: Uuid,
    pub actor_id: Uuid,
    pub key: String,
    pub operation: String,
    /// Digest of the call's arguments; a replay must match it.
    pub fingerprint: String,
    pub request_id: Uuid,
    pub created_at: OffsetDateTime,
}

impl IdempotencyRecord {
    pub fn new(
        scope: Uuid,
        actor_id: Uuid,
        key: impl Into<String>,
        operation: impl Into<String>,
        fingerprint: impl Into<String>,
        request_id: Uuid,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            scope,
            actor_id,
            key: key.into(),
            operation: operation.into(),
            fingerprint: fingerprint.into(),
            request_id,
            created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GetIdempotencyRecord {
    pub scope: Uuid,
    pub actor_id: Uuid,
    pub key: String,
}

impl Processor<GetIdempotencyRecord> for DatabaseProcessor {
    type Output = Option<IdempotencyRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetIdempotencyRecord")]
    async fn process(
        &self,
        query: GetIdempotencyRecord,
    ) -> Result<Option<IdempotencyRecord>, sqlx::Error> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(
            r#"
            SELECT scope, actor_id, key, operation, fingerprint, request_id, created_at
            FROM idempotency_keys
            WHERE scope = $1 AND actor_id = $2 AND key = $3
            "#,
        )
        .bind(query.scope)
        .bind(query.actor_id)
        .bind(&query.key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

impl IdempotencyRecord {
    /// Record a key. A duplicate `(scope, actor_id, key)` surfaces as a unique
    /// violation for the caller to interpret.
    pub async fn insert(
        db: &mut impl DatabaseAccessor,
        record: &IdempotencyRecord,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_keys (
                scope, actor_id, key, operation, fingerprint, request_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.scope)
        .bind(record.actor_id)
        .bind(&record.key)
        .bind(&record.operation)
        .bind(&record.fingerprint)
        .bind(record.request_id)
        .bind(record.created_at)
        .execute(db.acquire())
        .await?;
        Ok(())
    }
}
