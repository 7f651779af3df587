//! Lifecycle event definitions.
//!
//! Unlike an id-only tick, a lifecycle event carries the full
//! post-transition snapshot: collaborators must see the state the
//! transition produced, not whatever the request looks like by the time
//! the event is delivered.

use crate::entities::service_request::ServiceRequest;
use crate::entities::unix;
use hireloop_sdk::objects::{LifecycleEventPayload, Transition};
use time::OffsetDateTime;
use uuid::Uuid;

/// Emitted once per committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Unique per event; receivers dedupe on it.
    pub event_id: Uuid,
    pub transition: Transition,
    pub request_id: Uuid,
    pub actor_id: Uuid,
    pub occurred_at: OffsetDateTime,
    pub snapshot: ServiceRequest,
}

impl LifecycleEvent {
    pub fn new(
        transition: Transition,
        actor_id: Uuid,
        snapshot: ServiceRequest,
        occurred_at: OffsetDateTime,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            transition,
            request_id: snapshot.id,
            actor_id,
            occurred_at,
            snapshot,
        }
    }

    pub fn to_payload(&self) -> LifecycleEventPayload {
        LifecycleEventPayload {
            event_id: self.event_id,
            transition: self.transition,
            request_id: self.request_id,
            actor_id: self.actor_id,
            timestamp: unix(self.occurred_at),
            snapshot: self.snapshot.to_view(),
        }
    }
}
