//! Wire types shared between the gateway and its collaborators.
//!
//! These are the API/DTO versions without `sqlx::Type`. For database
//! operations, use the versions in `hireloop-core::entities`.

pub mod error;
pub mod event;
pub mod request;

pub use error::{ErrorBody, ErrorKind};
pub use event::{LifecycleEventPayload, Transition};
pub use request::{
    AcceptRequestBody, AcceptRequestResponse, AcceptanceView, CancelRequestBody,
    CloseRequestBody, CompleteRequestBody, CreateRequestBody, CreateRequestResponse,
    GetRequestQuery, ProfessionalAcceptanceView, ProfessionalAcceptancesQuery,
    ProfessionalAcceptancesResponse, RateRequestBody, RequestProfessionalsQuery,
    RequestProfessionalsResponse, RequestView, SelectProfessionalBody,
    SelectProfessionalResponse, StatusResponse, UpdateRequestBody, UpdateRequestResponse,
};

use serde::{Deserialize, Serialize};

/// Lifecycle status of a service request.
///
/// The serialized values are the exact strings used by collaborating clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
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
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::ActiveForAcceptance => "active_for_acceptance",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::AwaitingRating => "awaiting_rating",
            RequestStatus::Closed => "closed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// `closed` and `cancelled` accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Closed | RequestStatus::Cancelled)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one professional's acceptance of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceOutcome {
    PendingSelection,
    Selected,
    NotSelected,
    Completed,
    CompletedByOther,
}

impl std::fmt::Display for AcceptanceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcceptanceOutcome::PendingSelection => write!(f, "pending_selection"),
            AcceptanceOutcome::Selected => write!(f, "selected"),
            AcceptanceOutcome::NotSelected => write!(f, "not_selected"),
            AcceptanceOutcome::Completed => write!(f, "completed"),
            AcceptanceOutcome::CompletedByOther => write!(f, "completed_by_other"),
        }
    }
}

/// How soon the client needs the work done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
    Emergency,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Urgency::Low => write!(f, "low"),
            Urgency::Normal => write!(f, "normal"),
            Urgency::High => write!(f, "high"),
            Urgency::Emergency => write!(f, "emergency"),
        }
    }
}
