use crate::entities::{RequestStatus, Urgency, unix};
use crate::framework::DatabaseAccessor;
use hireloop_sdk::objects::RequestView;
use time::OffsetDateTime;
use uuid::Uuid;

/// One unit of requested work.
///
/// `selected_professional_id` is a set-once cell: it only changes through
/// [`ServiceRequest::bind_professional`], which refuses to overwrite it.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub client_id: Uuid,
    pub category: String,
    pub description: String,
    pub location: String,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub selected_professional_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
    pub closed_at: Option<OffsetDateTime>,
    pub close_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub rating: Option<i16>,
    pub rating_comment: Option<String>,
    /// Optimistic concurrency counter, bumped on every committed transition.
    pub version: i64,
}

/// Descriptive payload supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDetails {
    pub category: String,
    pub description: String,
    pub location: String,
    pub urgency: Urgency,
}

/// Partial update of [`RequestDetails`]; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDetailsPatch {
    pub category: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub urgency: Option<Urgency>,
}

impl RequestDetailsPatch {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.urgency.is_none()
    }
}

impl ServiceRequest {
    /// Build a fresh `pending` request.
    pub fn new(id: Uuid, client_id: Uuid, details: RequestDetails, now: OffsetDateTime) -> Self {
        Self {
            id,
            client_id,
            category: details.category,
            description: details.description,
            location: details.location,
            urgency: details.urgency,
            status: RequestStatus::Pending,
            selected_professional_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            closed_at: None,
            close_reason: None,
            cancellation_reason: None,
            cancelled_by: None,
            rating: None,
            rating_comment: None,
            version: 0,
        }
    }

    /// Set the selected professional. Returns the already-bound id if the
    /// cell was set before.
    pub fn bind_professional(&mut self, professional_id: Uuid) -> Result<(), Uuid> {
        match self.selected_professional_id {
            Some(existing) => Err(existing),
            None => {
                self.selected_professional_id = Some(professional_id);
                Ok(())
            }
        }
    }

    pub fn to_view(&self) -> RequestView {
        RequestView {
            id: self.id,
            client_id: self.client_id,
            category: self.category.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            urgency: self.urgency.into(),
            status: self.status.into(),
            selected_professional_id: self.selected_professional_id,
            created_at: unix(self.created_at),
            updated_at: unix(self.updated_at),
            completed_at: self.completed_at.map(unix),
            closed_at: self.closed_at.map(unix),
            close_reason: self.close_reason.clone(),
            cancellation_reason: self.cancellation_reason.clone(),
            cancelled_by: self.cancelled_by,
            rating: self.rating.and_then(|r| u8::try_from(r).ok()),
            rating_comment: self.rating_comment.clone(),
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    id, client_id, category, description, location, urgency, status,
    selected_professional_id, created_at, updated_at, completed_at, closed_at,
    close_reason, cancellation_reason, cancelled_by, rating, rating_comment, version
"#;

impl ServiceRequest {
    /// Fetch a single request row by id.
    #[tracing::instrument(skip_all, err, name = "SQL:FindServiceRequest")]
    pub async fn find(
        db: &mut impl DatabaseAccessor,
        id: Uuid,
    ) -> Result<Option<ServiceRequest>, sqlx::Error> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM service_requests WHERE id = $1");
        let request = sqlx::query_as::<_, ServiceRequest>(&sql)
            .bind(id)
            .fetch_optional(db.acquire())
            .await?;
        Ok(request)
    }

    /// Insert a new request row.
    pub async fn insert(
        db: &mut impl DatabaseAccessor,
        request: &ServiceRequest,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO service_requests (
                id, client_id, category, description, location, urgency, status,
                selected_professional_id, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(request.id)
        .bind(request.client_id)
        .bind(&request.category)
        .bind(&request.description)
        .bind(&request.location)
        .bind(request.urgency)
        .bind(request.status)
        .bind(request.selected_professional_id)
        .bind(request.created_at)
        .bind(request.updated_at)
        .bind(request.version)
        .execute(db.acquire())
        .await?;
        Ok(())
    }

    /// Write every mutable column, guarded by the version the caller loaded.
    ///
    /// Returns `false` when no row matched, i.e. someone else committed
    /// first.
    pub async fn update_versioned(
        db: &mut impl DatabaseAccessor,
        request: &ServiceRequest,
        expected_version: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE service_requests SET
                category = $3,
                description = $4,
                location = $5,
                urgency = $6,
                status = $7,
                selected_professional_id = $8,
                updated_at = $9,
                completed_at = $10,
                closed_at = $11,
                close_reason = $12,
                cancellation_reason = $13,
                cancelled_by = $14,
                rating = $15,
                rating_comment = $16,
                version = $17
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(request.id)
        .bind(expected_version)
        .bind(&request.category)
        .bind(&request.description)
        .bind(&request.location)
        .bind(request.urgency)
        .bind(request.status)
        .bind(request.selected_professional_id)
        .bind(request.updated_at)
        .bind(request.completed_at)
        .bind(request.closed_at)
        .bind(&request.close_reason)
        .bind(&request.cancellation_reason)
        .bind(request.cancelled_by)
        .bind(request.rating)
        .bind(&request.rating_comment)
        .bind(request.version)
        .execute(db.acquire())
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
