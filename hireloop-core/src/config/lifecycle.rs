//! Tunables of the lifecycle engine.

use std::time::Duration;

/// Limits and timeouts applied by the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Minimum rating comment length, counted in characters after trimming.
    pub min_comment_len: usize,
    /// Maximum length of any free-text field, in characters.
    pub max_field_len: usize,
    /// Upper bound on waiting for a request's lock.
    pub lock_timeout: Duration,
    /// Attempts against an unavailable store before giving up.
    pub store_retry_attempts: u32,
    /// Capacity of the lifecycle event channel.
    pub event_buffer: usize,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            min_comment_len: 10,
            max_field_len: 2000,
            lock_timeout: Duration::from_millis(5000),
            store_retry_attempts: 3,
            event_buffer: 256,
        }
    }
}
