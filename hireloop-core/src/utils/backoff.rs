//! Retry delays.

use crate::store::StoreError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Exponent cap for notification retries (2^11 = 2048 seconds).
pub const MAX_NOTIFY_EXPONENT: u32 = 11;

/// Base delay between attempts against an unavailable store.
const STORE_RETRY_BASE: Duration = Duration::from_millis(50);

/// Delay before notification retry number `retry_count`: 2^n seconds,
/// with n capped at [`MAX_NOTIFY_EXPONENT`].
pub fn calculate_retry_delay(retry_count: u32) -> Duration {
    let seconds = 2u64.pow(retry_count.min(MAX_NOTIFY_EXPONENT));
    Duration::from_secs(seconds)
}

/// Delay before store retry number `attempt`, doubled per attempt with up
/// to 50% random jitter so competing nodes spread out.
pub fn store_retry_delay(attempt: u32) -> Duration {
    let base = STORE_RETRY_BASE * 2u32.pow(attempt.min(6));
    let jitter_ms = rand::rng().random_range(0..=base.as_millis() as u64 / 2);
    base + Duration::from_millis(jitter_ms)
}

/// Run `op` until it succeeds, fails permanently, or `attempts` transient
/// failures have been seen.
pub async fn retry_transient<T, F, Fut>(attempts: u32, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_transient() && attempt + 1 < attempts.max(1) => {
                let delay = store_retry_delay(attempt);
                tracing::warn!(error = %err, attempt = attempt + 1, ?delay, "Store unavailable, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
