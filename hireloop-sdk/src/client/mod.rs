//! HTTP client for the Hireloop gateway.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

mod gateway;
mod notification;

pub use gateway::GatewayClient;
pub use notification::verify_notification;

use reqwest::StatusCode;

use crate::objects::ErrorBody;
use crate::signature::SignatureError;

/// Errors produced by the SDK HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// HMAC signature could not be computed.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// The gateway rejected the operation with a typed error body.
    #[error("gateway error: status {status}, {body:?}")]
    Gateway { status: StatusCode, body: ErrorBody },

    /// The server returned a non-2xx status code without a parsable body.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// The typed gateway error, if the server produced one.
    pub fn gateway_error(&self) -> Option<&ErrorBody> {
        match self {
            ClientError::Gateway { body, .. } => Some(body),
            _ => None,
        }
    }
}
