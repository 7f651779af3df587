use crate::entities::Urgency;
use crate::entities::service_request::{RequestDetails, RequestDetailsPatch};
use ring::digest::{Context, SHA256};
use uuid::Uuid;

/// A mutation of an existing request, as named by the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Accept {
        professional_id: Uuid,
    },
    Select {
        client_id: Uuid,
        professional_id: Uuid,
    },
    CloseWithoutSelection {
        client_id: Uuid,
        reason: String,
    },
    Complete {
        professional_id: Uuid,
    },
    RateAndClose {
        client_id: Uuid,
        rating: u8,
        comment: String,
    },
    Cancel {
        caller_id: Uuid,
        reason: String,
    },
    UpdateDetails {
        client_id: Uuid,
        patch: RequestDetailsPatch,
    },
}

/// Stable operation names, recorded next to idempotency keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Accept,
    Select,
    CloseWithoutSelection,
    Complete,
    RateAndClose,
    Cancel,
    UpdateDetails,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "create_request",
            OperationKind::Accept => "accept_request",
            OperationKind::Select => "select_professional",
            OperationKind::CloseWithoutSelection => "close_without_selection",
            OperationKind::Complete => "complete_by_professional",
            OperationKind::RateAndClose => "rate_and_close",
            OperationKind::Cancel => "cancel_request",
            OperationKind::UpdateDetails => "update_request_details",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Accept { .. } => OperationKind::Accept,
            Operation::Select { .. } => OperationKind::Select,
            Operation::CloseWithoutSelection { .. } => OperationKind::CloseWithoutSelection,
            Operation::Complete { .. } => OperationKind::Complete,
            Operation::RateAndClose { .. } => OperationKind::RateAndClose,
            Operation::Cancel { .. } => OperationKind::Cancel,
            Operation::UpdateDetails { .. } => OperationKind::UpdateDetails,
        }
    }

    /// The client or professional on whose behalf the operation runs.
    pub fn actor_id(&self) -> Uuid {
        match self {
            Operation::Accept { professional_id } | Operation::Complete { professional_id } => {
                *professional_id
            }
            Operation::Select { client_id, .. }
            | Operation::CloseWithoutSelection { client_id, .. }
            | Operation::RateAndClose { client_id, .. }
            | Operation::UpdateDetails { client_id, .. } => *client_id,
            Operation::Cancel { caller_id, .. } => *caller_id,
        }
    }
}

impl Operation {
    /// Digest of everything but the actor, compared when a key is replayed.
    ///
    /// Text is trimmed first, matching what `apply` stores.
    pub fn fingerprint(&self) -> String {
        let digest = Fingerprint::new(self.kind());
        let digest = match self {
            Operation::Accept { .. } | Operation::Complete { .. } => digest,
            Operation::Select {
                professional_id, ..
            } => digest.uuid(*professional_id),
            Operation::CloseWithoutSelection { reason, .. } | Operation::Cancel { reason, .. } => {
                digest.text(reason)
            }
            Operation::RateAndClose {
                rating, comment, ..
            } => digest.byte(*rating).text(comment),
            Operation::UpdateDetails { patch, .. } => digest
                .opt_text(patch.category.as_deref())
                .opt_text(patch.description.as_deref())
                .opt_text(patch.location.as_deref())
                .opt_urgency(patch.urgency),
        };
        digest.finish()
    }
}

/// Fingerprint of a create call's payload.
pub fn create_fingerprint(details: &RequestDetails) -> String {
    Fingerprint::new(OperationKind::Create)
        .text(&details.category)
        .text(&details.description)
        .text(&details.location)
        .opt_urgency(Some(details.urgency))
        .finish()
}

struct Fingerprint(Context);

impl Fingerprint {
    fn new(kind: OperationKind) -> Self {
        Self(Context::new(&SHA256)).text(kind.as_str())
    }

    fn byte(mut self, value: u8) -> Self {
        self.0.update(&[value]);
        self
    }

    fn uuid(mut self, id: Uuid) -> Self {
        self.0.update(id.as_bytes());
        self
    }

    /// Length-prefixed so adjacent fields cannot run into each other.
    fn text(mut self, value: &str) -> Self {
        let value = value.trim();
        self.0.update(&(value.len() as u64).to_be_bytes());
        self.0.update(value.as_bytes());
        self
    }

    fn opt_text(self, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.byte(1).text(value),
            None => self.byte(0),
        }
    }

    fn opt_urgency(self, value: Option<Urgency>) -> Self {
        match value {
            Some(urgency) => self.byte(1).byte(urgency as u8),
            None => self.byte(0),
        }
    }

    fn finish(self) -> String {
        fast32::base64::RFC4648_NOPAD.encode(self.0.finish().as_ref())
    }
}
