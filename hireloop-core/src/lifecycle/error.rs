use crate::entities::RequestStatus;
use crate::ledger::LedgerError;
use crate::store::StoreError;
use hireloop_sdk::objects::ErrorKind;
use thiserror::Error;

/// Every way a lifecycle operation can fail.
///
/// `status` is the authoritative status of the request at the time of the
/// failure, when the request exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("{message}")]
    Validation {
        message: String,
        status: Option<RequestStatus>,
    },

    #[error("{message}")]
    NotFound {
        message: String,
        status: Option<RequestStatus>,
    },

    #[error("{message}")]
    Forbidden {
        message: String,
        status: Option<RequestStatus>,
    },

    #[error("{message}")]
    Conflict {
        message: String,
        status: Option<RequestStatus>,
    },

    #[error("{message}")]
    Unavailable {
        message: String,
        status: Option<RequestStatus>,
    },
}

impl LifecycleError {
    pub fn validation(status: Option<RequestStatus>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            status,
        }
    }

    pub fn not_found(status: Option<RequestStatus>, message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            status,
        }
    }

    pub fn forbidden(status: RequestStatus, message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn conflict(status: RequestStatus, message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            status: None,
        }
    }

    /// Conflict caused by the request's current status.
    pub fn illegal_in(status: RequestStatus, operation: &str) -> Self {
        Self::conflict(status, format!("cannot {operation} a request that is {status}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Validation { .. } => ErrorKind::ValidationError,
            LifecycleError::NotFound { .. } => ErrorKind::NotFound,
            LifecycleError::Forbidden { .. } => ErrorKind::Forbidden,
            LifecycleError::Conflict { .. } => ErrorKind::Conflict,
            LifecycleError::Unavailable { .. } => ErrorKind::Unavailable,
        }
    }

    pub fn status(&self) -> Option<RequestStatus> {
        match self {
            LifecycleError::Validation { status, .. }
            | LifecycleError::NotFound { status, .. }
            | LifecycleError::Forbidden { status, .. }
            | LifecycleError::Conflict { status, .. }
            | LifecycleError::Unavailable { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LifecycleError::Validation { message, .. }
            | LifecycleError::NotFound { message, .. }
            | LifecycleError::Forbidden { message, .. }
            | LifecycleError::Conflict { message, .. }
            | LifecycleError::Unavailable { message, .. } => message,
        }
    }

    /// Map a ledger refusal, which always happens on an existing request.
    pub(crate) fn from_ledger(status: RequestStatus, err: LedgerError) -> Self {
        match err {
            LedgerError::NotAccepted { .. } => Self::not_found(Some(status), err.to_string()),
            LedgerError::AlreadyAccepted { .. }
            | LedgerError::AlreadySelected { .. }
            | LedgerError::NoneSelected => Self::conflict(status, err.to_string()),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        Self::unavailable(err.to_string())
    }
}
