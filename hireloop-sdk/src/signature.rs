//! Signature algorithm and verification for the Hireloop gateway.
//!
//! The gateway trusts caller identities only when the request was signed by
//! the upstream service that authenticated the caller. Notifications sent
//! to the notification collaborator are signed the same way.
//!
//! ```text
//! Hireloop-Signature: {unix_timestamp}.{base64_signature}
//! ```
//!
//! Two signing schemes exist:
//!
//! * **Body signing** (POST operations, notifications):
//!   `HMAC-SHA256("{timestamp}.{json_body}", secret)`
//!
//! * **Path signing** (GET queries):
//!   `HMAC-SHA256("{path_and_query}.{timestamp}", secret)`

/// Header name for the HMAC signature.
pub const SIGNATURE_HEADER: &str = "Hireloop-Signature";

/// Header name for the notification event id, used by receivers to dedupe.
pub const EVENT_ID_HEADER: &str = "Hireloop-Event-Id";

/// Maximum allowed age of a signature (in seconds).
pub const MAX_SIGNATURE_AGE: i64 = 5 * 60;

/// Marker trait for types that can participate in body signing via
/// [`SignedObject`].
pub trait Signature: for<'de> serde::Deserialize<'de> + serde::Serialize {}

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid header format")]
    InvalidFormat,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("signature expired")]
    Expired,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

// ---------------------------------------------------------------------------
// SignedObject: body signing
// ---------------------------------------------------------------------------

/// A signed body carrying its typed payload, timestamp, raw JSON, and
/// HMAC-SHA256 signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedObject<T: Signature> {
    pub body: T,
    pub timestamp: i64,
    pub json: String,
    pub signature: Box<[u8]>,
}

impl<T: Signature> SignedObject<T> {
    /// Serialize `body`, sign `"{now}.{json}"` with `key`.
    pub fn new(body: T, key: &[u8]) -> Result<Self, serde_json::Error> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        Self::new_at(body, key, now)
    }

    /// Same as [`new`](Self::new) with an explicit timestamp.
    pub fn new_at(body: T, key: &[u8], timestamp: i64) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(&body)?;
        let signature = sign_bytes(format!("{timestamp}.{json}").as_bytes(), key);
        Ok(Self {
            body,
            timestamp,
            json,
            signature,
        })
    }

    /// Reconstruct a [`SignedObject`] from a raw `Hireloop-Signature` header
    /// value and the JSON body string.
    ///
    /// This parses the header and deserializes the body but does **not**
    /// verify the HMAC: call [`verify`](Self::verify) for that.
    pub fn from_header_and_body(
        header_value: &str,
        body_json: String,
    ) -> Result<Self, SignatureError> {
        let (timestamp, signature) = parse_signature_header(header_value)?;
        let body: T = serde_json::from_str(&body_json)?;
        Ok(Self {
            body,
            timestamp,
            json: body_json,
            signature,
        })
    }

    /// Verify the HMAC signature and timestamp freshness, consuming `self`
    /// and returning the authenticated payload.
    pub fn verify(self, key: &[u8]) -> Result<T, SignatureError> {
        let data = format!("{}.{}", self.timestamp, self.json);
        ring::hmac::verify(
            &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
            data.as_bytes(),
            self.signature.as_ref(),
        )?;
        check_timestamp(self.timestamp)?;
        Ok(self.body)
    }

    /// Format the full `Hireloop-Signature` header value (`{timestamp}.{b64}`).
    pub fn to_header(&self) -> String {
        format_signature_header(self.timestamp, &self.signature)
    }
}

fn sign_bytes(data: &[u8], key: &[u8]) -> Box<[u8]> {
    let signature = ring::hmac::sign(&ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key), data);
    signature.as_ref().to_owned().into_boxed_slice()
}

// ---------------------------------------------------------------------------
// Header parsing / formatting
// ---------------------------------------------------------------------------

/// Parse a `Hireloop-Signature` header value (`{timestamp}.{base64}`) into
/// `(timestamp, raw_signature_bytes)`.
pub fn parse_signature_header(value: &str) -> Result<(i64, Box<[u8]>), SignatureError> {
    let (timestamp, encoded) = value.split_once('.').ok_or(SignatureError::InvalidFormat)?;
    let timestamp: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidFormat)?;
    let signature_bytes = fast32::base64::RFC4648_NOPAD
        .decode_str(encoded)
        .map_err(|_| SignatureError::InvalidBase64)?
        .into_boxed_slice();
    Ok((timestamp, signature_bytes))
}

/// Format a `{timestamp}.{base64}` header value from its parts.
pub fn format_signature_header(timestamp: i64, signature: &[u8]) -> String {
    format!(
        "{}.{}",
        timestamp,
        fast32::base64::RFC4648_NOPAD.encode(signature)
    )
}

/// Check that a signature timestamp is within [`MAX_SIGNATURE_AGE`].
pub fn check_timestamp(timestamp: i64) -> Result<(), SignatureError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    if now - timestamp > MAX_SIGNATURE_AGE {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Path signing (GET queries)
// ---------------------------------------------------------------------------

/// Sign a request path with its query string:
/// `HMAC-SHA256("{path_and_query}.{timestamp}", key)`.
///
/// Returns the formatted `Hireloop-Signature` header value.
pub fn sign_path(path_and_query: &str, key: &[u8]) -> String {
    let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
    let sig = sign_bytes(format!("{path_and_query}.{timestamp}").as_bytes(), key);
    format_signature_header(timestamp, &sig)
}

/// Verify a signed request path.
pub fn verify_path(
    path_and_query: &str,
    timestamp: i64,
    signature: &[u8],
    key: &[u8],
) -> Result<(), SignatureError> {
    let data = format!("{path_and_query}.{timestamp}");
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        data.as_bytes(),
        signature,
    )?;
    check_timestamp(timestamp)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::CancelRequestBody;
    use uuid::Uuid;

    fn body() -> CancelRequestBody {
        CancelRequestBody {
            request_id: Uuid::nil(),
            caller_id: Uuid::nil(),
            reason: "changed my mind".to_string(),
            idempotency_key: None,
        }
    }

    #[test]
    fn test_signed_body_verifies_with_same_key() {
        let signed = SignedObject::new(body(), b"secret").unwrap();
        let header = signed.to_header();
        let parsed =
            SignedObject::<CancelRequestBody>::from_header_and_body(&header, signed.json).unwrap();
        let verified = parsed.verify(b"secret").unwrap();
        assert_eq!(verified.reason, "changed my mind");
    }

    #[test]
    fn test_signed_body_rejects_other_key() {
        let signed = SignedObject::new(body(), b"secret").unwrap();
        let result = signed.verify(b"other");
        assert!(matches!(result, Err(SignatureError::SignatureMismatch)));
    }

    #[test]
    fn test_signed_body_rejects_tampered_json() {
        let signed = SignedObject::new(body(), b"secret").unwrap();
        let tampered = signed.json.replace("changed my mind", "something else");
        let parsed =
            SignedObject::<CancelRequestBody>::from_header_and_body(&signed.to_header(), tampered)
                .unwrap();
        assert!(parsed.verify(b"secret").is_err());
    }

    #[test]
    fn test_expired_signature() {
        let old = time::OffsetDateTime::now_utc().unix_timestamp() - MAX_SIGNATURE_AGE - 10;
        let signed = SignedObject::new_at(body(), b"secret", old).unwrap();
        assert!(matches!(signed.verify(b"secret"), Err(SignatureError::Expired)));
    }

    #[test]
    fn test_malformed_header() {
        assert!(matches!(
            parse_signature_header("no-dot-here"),
            Err(SignatureError::InvalidFormat)
        ));
        assert!(matches!(
            parse_signature_header("abc.AAAA"),
            Err(SignatureError::InvalidFormat)
        ));
        assert!(matches!(
            parse_signature_header("123.!!!"),
            Err(SignatureError::InvalidBase64)
        ));
    }

    #[test]
    fn test_path_signature() {
        let path = "/api/v1/request?requestId=1&callerId=2";
        let header = sign_path(path, b"secret");
        let (ts, sig) = parse_signature_header(&header).unwrap();
        assert!(verify_path(path, ts, &sig, b"secret").is_ok());
        assert!(verify_path("/api/v1/request?requestId=1&callerId=3", ts, &sig, b"secret").is_err());
    }
}
