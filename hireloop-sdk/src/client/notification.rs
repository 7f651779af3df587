//! Notification signature verification helper.
//!
//! Convenience wrapper around [`SignedObject`] for receivers of the
//! lifecycle notifications sent by the Hireloop server.

use crate::objects::LifecycleEventPayload;
use crate::signature::{SignatureError, SignedObject};

/// Verify and deserialize an incoming lifecycle notification.
///
/// * `signature_header` – value of the `Hireloop-Signature` request header.
/// * `body` – raw JSON request body string.
/// * `secret` – the notifier secret shared with the Hireloop server.
///
/// # Example
///
/// ```ignore
/// use hireloop_sdk::client::verify_notification;
///
/// let event = verify_notification(signature_header, &body, secret)?;
/// if seen_before(event.event_id) { return Ok(()); }
/// ```
pub fn verify_notification(
    signature_header: &str,
    body: &str,
    secret: &[u8],
) -> Result<LifecycleEventPayload, SignatureError> {
    SignedObject::<LifecycleEventPayload>::from_header_and_body(signature_header, body.to_owned())?
        .verify(secret)
}
