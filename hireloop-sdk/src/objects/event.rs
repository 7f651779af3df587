//! Notification payloads published on every lifecycle transition.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RequestView;
use crate::signature::Signature;

/// Name of the lifecycle transition that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    RequestCreated,
    RequestUpdated,
    ProfessionalAccepted,
    ProfessionalSelected,
    RequestCompleted,
    RequestClosed,
    RequestCancelled,
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::RequestCreated => write!(f, "request_created"),
            Transition::RequestUpdated => write!(f, "request_updated"),
            Transition::ProfessionalAccepted => write!(f, "professional_accepted"),
            Transition::ProfessionalSelected => write!(f, "professional_selected"),
            Transition::RequestCompleted => write!(f, "request_completed"),
            Transition::RequestClosed => write!(f, "request_closed"),
            Transition::RequestCancelled => write!(f, "request_cancelled"),
        }
    }
}

/// Body POSTed to the notification collaborator.
///
/// Delivery is at-least-once; receivers dedupe on `event_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEventPayload {
    pub event_id: Uuid,
    pub transition: Transition,
    pub request_id: Uuid,
    /// The client or professional whose call produced the transition.
    pub actor_id: Uuid,
    /// Unix timestamp of the transition.
    pub timestamp: i64,
    pub snapshot: RequestView,
}

impl Signature for LifecycleEventPayload {}
