//! Fire-and-forget publication of lifecycle events.

use super::channels::LifecycleEventSender;
use super::types::LifecycleEvent;
use tokio::sync::mpsc::error::TrySendError;

/// Publishes events without ever blocking or failing the caller.
///
/// A full or closed channel loses the event; the loss is logged.
#[derive(Clone, Default)]
pub struct EventEmitter {
    sender: Option<LifecycleEventSender>,
}

impl EventEmitter {
    pub fn new(sender: LifecycleEventSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// An emitter that only logs.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Returns whether the event was handed to the channel.
    pub fn emit(&self, event: LifecycleEvent) -> bool {
        tracing::debug!(
            event_id = %event.event_id,
            request_id = %event.request_id,
            transition = %event.transition,
            "Emitting lifecycle event"
        );
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    request_id = %event.request_id,
                    transition = %event.transition,
                    "Lifecycle event channel full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    request_id = %event.request_id,
                    "Lifecycle event channel closed, dropping event"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecyclePolicy;
    use crate::entities::Urgency;
    use crate::entities::service_request::RequestDetails;
    use crate::events::lifecycle_event_channel;
    use crate::lifecycle::RequestAggregate;
    use hireloop_sdk::objects::Transition;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn event() -> LifecycleEvent {
        let aggregate = RequestAggregate::create(
            Uuid::now_v7(),
            RequestDetails {
                category: "gardening".to_string(),
                description: "Trim the hedge".to_string(),
                location: "Rose Cottage".to_string(),
                urgency: Urgency::Normal,
            },
            OffsetDateTime::now_utc(),
            &LifecyclePolicy::default(),
        )
        .unwrap();
        LifecycleEvent::new(
            Transition::RequestCreated,
            aggregate.request.client_id,
            aggregate.request,
            OffsetDateTime::now_utc(),
        )
    }

    #[tokio::test]
    async fn test_emit_delivers_to_channel() {
        let (tx, mut rx) = lifecycle_event_channel(4);
        let emitter = EventEmitter::new(tx);
        let sent = event();
        assert!(emitter.emit(sent.clone()));
        assert_eq!(rx.recv().await, Some(sent));
    }

    #[test]
    fn test_full_channel_drops_without_failing() {
        let (tx, _rx) = lifecycle_event_channel(1);
        let emitter = EventEmitter::new(tx);
        assert!(emitter.emit(event()));
        assert!(!emitter.emit(event()));
    }

    #[test]
    fn test_closed_channel_drops_without_failing() {
        let (tx, rx) = lifecycle_event_channel(1);
        drop(rx);
        let emitter = EventEmitter::new(tx);
        assert!(!emitter.emit(event()));
        assert!(!EventEmitter::disabled().emit(event()));
    }

    #[test]
    fn test_payload_carries_snapshot() {
        let event = event();
        let payload = event.to_payload();
        assert_eq!(payload.event_id, event.event_id);
        assert_eq!(payload.snapshot.id, event.request_id);
        assert_eq!(payload.transition, Transition::RequestCreated);
    }
}
