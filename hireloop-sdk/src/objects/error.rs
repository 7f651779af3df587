//! Error body returned by the gateway for every failed operation.

use serde::{Deserialize, Serialize};

use super::RequestStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input. Never retried automatically.
    ValidationError,
    NotFound,
    /// Caller is not the owning client / bound professional.
    Forbidden,
    /// Illegal in the current status, or a concurrent winner already applied.
    Conflict,
    /// Missing or invalid request signature.
    Unauthorized,
    /// Store unavailable or lock timeout. Safe to retry.
    Unavailable,
}

impl ErrorKind {
    /// Whether a caller may retry the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Unavailable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
    /// Current authoritative status of the request, when it exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
}
