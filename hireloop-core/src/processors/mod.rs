//! Long-running processors.
//!
//! - `NotificationSender`: receives `LifecycleEvent`, delivers it to the
//!   notification collaborator

pub mod notification_sender;

pub use notification_sender::{NotificationSender, NotifyError};
