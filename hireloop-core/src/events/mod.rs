//! Lifecycle events.
//!
//! # Event Flow
//!
//! 1. `LifecycleEngine` commits a transition and hands a `LifecycleEvent`
//!    to the `EventEmitter`
//! 2. `EventEmitter` pushes it onto a bounded channel with `try_send`
//! 3. `NotificationSender` drains the channel and POSTs each event to the
//!    notification collaborator

pub mod channels;
pub mod emitter;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, LifecycleEventReceiver, LifecycleEventSender,
    lifecycle_event_channel,
};
pub use emitter::EventEmitter;
pub use types::LifecycleEvent;
