//! Event channel factory and handles.

use super::types::LifecycleEvent;
use tokio::sync::mpsc;

/// Default buffer size for the lifecycle event channel.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for LifecycleEvent events.
pub type LifecycleEventSender = mpsc::Sender<LifecycleEvent>;
/// Receiver handle for LifecycleEvent events.
pub type LifecycleEventReceiver = mpsc::Receiver<LifecycleEvent>;

/// Create a new LifecycleEvent channel. A zero buffer falls back to the
/// default, since `mpsc::channel` cannot be unbuffered.
pub fn lifecycle_event_channel(buffer: usize) -> (LifecycleEventSender, LifecycleEventReceiver) {
    let buffer = if buffer == 0 {
        DEFAULT_CHANNEL_BUFFER
    } else {
        buffer
    };
    mpsc::channel(buffer)
}
