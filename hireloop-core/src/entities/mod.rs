pub mod acceptance;
pub mod idempotency;
pub mod service_request;

use hireloop_sdk::objects::{
    AcceptanceOutcome as SdkAcceptanceOutcome, RequestStatus as SdkRequestStatus,
    Urgency as SdkUrgency,
};

/// Lifecycle status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `hireloop_sdk::objects::RequestStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "request_status")]
pub enum RequestStatus {
    Pending,
    ActiveForAcceptance,
    InProgress,
    Completed,
    AwaitingRating,
    Closed,
    Cancelled,
}

impl RequestStatus {
    /// `closed` and `cancelled` accept no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Closed | RequestStatus::Cancelled)
    }

    /// Statuses in which professionals may still express interest.
    pub fn is_open_for_acceptance(self) -> bool {
        matches!(
            self,
            RequestStatus::Pending | RequestStatus::ActiveForAcceptance
        )
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", SdkRequestStatus::from(*self))
    }
}

impl From<RequestStatus> for SdkRequestStatus {
    fn from(value: RequestStatus) -> Self {
        match value {
            RequestStatus::Pending => SdkRequestStatus::Pending,
            RequestStatus::ActiveForAcceptance => SdkRequestStatus::ActiveForAcceptance,
            RequestStatus::InProgress => SdkRequestStatus::InProgress,
            RequestStatus::Completed => SdkRequestStatus::Completed,
            RequestStatus::AwaitingRating => SdkRequestStatus::AwaitingRating,
            RequestStatus::Closed => SdkRequestStatus::Closed,
            RequestStatus::Cancelled => SdkRequestStatus::Cancelled,
        }
    }
}

impl From<SdkRequestStatus> for RequestStatus {
    fn from(value: SdkRequestStatus) -> Self {
        match value {
            SdkRequestStatus::Pending => RequestStatus::Pending,
            SdkRequestStatus::ActiveForAcceptance => RequestStatus::ActiveForAcceptance,
            SdkRequestStatus::InProgress => RequestStatus::InProgress,
            SdkRequestStatus::Completed => RequestStatus::Completed,
            SdkRequestStatus::AwaitingRating => RequestStatus::AwaitingRating,
            SdkRequestStatus::Closed => RequestStatus::Closed,
            SdkRequestStatus::Cancelled => RequestStatus::Cancelled,
        }
    }
}

/// Acceptance outcome for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `hireloop_sdk::objects::AcceptanceOutcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "acceptance_outcome")]
pub enum AcceptanceOutcome {
    PendingSelection,
    Selected,
    NotSelected,
    Completed,
    CompletedByOther,
}

impl AcceptanceOutcome {
    /// Outcomes that bind the professional to the request.
    pub fn is_winning(self) -> bool {
        matches!(
            self,
            AcceptanceOutcome::Selected | AcceptanceOutcome::Completed
        )
    }
}

impl From<AcceptanceOutcome> for SdkAcceptanceOutcome {
    fn from(value: AcceptanceOutcome) -> Self {
        match value {
            AcceptanceOutcome::PendingSelection => SdkAcceptanceOutcome::PendingSelection,
            AcceptanceOutcome::Selected => SdkAcceptanceOutcome::Selected,
            AcceptanceOutcome::NotSelected => SdkAcceptanceOutcome::NotSelected,
            AcceptanceOutcome::Completed => SdkAcceptanceOutcome::Completed,
            AcceptanceOutcome::CompletedByOther => SdkAcceptanceOutcome::CompletedByOther,
        }
    }
}

impl From<SdkAcceptanceOutcome> for AcceptanceOutcome {
    fn from(value: SdkAcceptanceOutcome) -> Self {
        match value {
            SdkAcceptanceOutcome::PendingSelection => AcceptanceOutcome::PendingSelection,
            SdkAcceptanceOutcome::Selected => AcceptanceOutcome::Selected,
            SdkAcceptanceOutcome::NotSelected => AcceptanceOutcome::NotSelected,
            SdkAcceptanceOutcome::Completed => AcceptanceOutcome::Completed,
            SdkAcceptanceOutcome::CompletedByOther => AcceptanceOutcome::CompletedByOther,
        }
    }
}

/// Urgency for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "request_urgency")]
pub enum Urgency {
    Low,
    Normal,
    High,
    Emergency,
}

impl From<Urgency> for SdkUrgency {
    fn from(value: Urgency) -> Self {
        match value {
            Urgency::Low => SdkUrgency::Low,
            Urgency::Normal => SdkUrgency::Normal,
            Urgency::High => SdkUrgency::High,
            Urgency::Emergency => SdkUrgency::Emergency,
        }
    }
}

impl From<SdkUrgency> for Urgency {
    fn from(value: SdkUrgency) -> Self {
        match value {
            SdkUrgency::Low => Urgency::Low,
            SdkUrgency::Normal => Urgency::Normal,
            SdkUrgency::High => Urgency::High,
            SdkUrgency::Emergency => Urgency::Emergency,
        }
    }
}

/// Unix timestamp used by every wire representation.
pub(crate) fn unix(at: time::OffsetDateTime) -> i64 {
    at.unix_timestamp()
}
