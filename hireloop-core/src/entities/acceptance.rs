use crate::entities::{AcceptanceOutcome, RequestStatus, unix};
use crate::framework::{DatabaseAccessor, DatabaseProcessor};
use hireloop_sdk::objects::{AcceptanceView, ProfessionalAcceptanceView};
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

/// One professional's expression of interest in a request.
///
/// Identity is the `(request_id, professional_id)` pair; `id` is the opaque
/// handle returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Acceptance {
    pub id: Uuid,
    pub request_id: Uuid,
    pub professional_id: Uuid,
    /// Position in the request's ledger, breaks `accepted_at` ties.
    pub sequence: i32,
    pub accepted_at: OffsetDateTime,
    pub outcome: AcceptanceOutcome,
    pub updated_at: OffsetDateTime,
}

impl Acceptance {
    pub fn to_view(&self) -> AcceptanceView {
        AcceptanceView {
            acceptance_id: self.id,
            professional_id: self.professional_id,
            accepted_at: unix(self.accepted_at),
            outcome: self.outcome.into(),
        }
    }
}

/// An acceptance joined with the current status of its request, as listed
/// for the professional who made it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProfessionalAcceptance {
    pub id: Uuid,
    pub request_id: Uuid,
    pub accepted_at: OffsetDateTime,
    pub outcome: AcceptanceOutcome,
    pub request_status: RequestStatus,
}

impl ProfessionalAcceptance {
    pub fn to_view(&self) -> ProfessionalAcceptanceView {
        ProfessionalAcceptanceView {
            acceptance_id: self.id,
            request_id: self.request_id,
            accepted_at: unix(self.accepted_at),
            outcome: self.outcome.into(),
            request_status: self.request_status.into(),
        }
    }
}

impl Acceptance {
    /// All acceptances of one request in ledger order.
    #[tracing::instrument(skip_all, err, name = "SQL:ListAcceptancesForRequest")]
    pub async fn list_for_request(
        db: &mut impl DatabaseAccessor,
        request_id: Uuid,
    ) -> Result<Vec<Acceptance>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Acceptance>(
            r#"
            SELECT id, request_id, professional_id, sequence, accepted_at, outcome, updated_at
            FROM acceptances
            WHERE request_id = $1
            ORDER BY accepted_at ASC, sequence ASC
            "#,
        )
        .bind(request_id)
        .fetch_all(db.acquire())
        .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone)]
/// Every acceptance a professional has made, newest first.
pub struct ListAcceptancesByProfessional {
    pub professional_id: Uuid,
}

impl Processor<ListAcceptancesByProfessional> for DatabaseProcessor {
    type Output = Vec<ProfessionalAcceptance>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListAcceptancesByProfessional")]
    async fn process(
        &self,
        query: ListAcceptancesByProfessional,
    ) -> Result<Vec<ProfessionalAcceptance>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ProfessionalAcceptance>(
            r#"
            SELECT a.id, a.request_id, a.accepted_at, a.outcome, r.status AS request_status
            FROM acceptances a
            JOIN service_requests r ON r.id = a.request_id
            WHERE a.professional_id = $1
            ORDER BY a.accepted_at DESC
            "#,
        )
        .bind(query.professional_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

impl Acceptance {
    /// Insert a new row or overwrite the outcome of an existing one.
    ///
    /// The `(request_id, professional_id)` unique constraint is the
    /// database-side guard against double acceptance.
    pub async fn upsert(
        db: &mut impl DatabaseAccessor,
        acceptance: &Acceptance,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO acceptances (
                id, request_id, professional_id, sequence, accepted_at, outcome, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (request_id, professional_id)
            DO UPDATE SET outcome = EXCLUDED.outcome, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(acceptance.id)
        .bind(acceptance.request_id)
        .bind(acceptance.professional_id)
        .bind(acceptance.sequence)
        .bind(acceptance.accepted_at)
        .bind(acceptance.outcome)
        .bind(acceptance.updated_at)
        .execute(db.acquire())
        .await?;
        Ok(())
    }
}
