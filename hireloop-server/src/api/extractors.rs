//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `SignedBody<T>`: verifies the `Hireloop-Signature` header against a
//!   signed JSON body (POST operations).
//! - `SignedQuery<T>`: verifies the `Hireloop-Signature` header against the
//!   request path and query string (GET queries).
//!
//! When `gateway.require_signature` is off, a missing header is tolerated,
//! but a header that is present is still verified.
//!
//! All cryptographic operations are delegated to [`hireloop_sdk::signature`].

use axum::{
    extract::{FromRequest, FromRequestParts, OriginalUri, Query, Request},
    http::{HeaderMap, request::Parts},
    response::{IntoResponse, Response},
};
use hireloop_core::gateway::GatewayError;
use hireloop_sdk::signature::{self, SIGNATURE_HEADER, Signature, SignatureError, SignedObject};
use serde::de::DeserializeOwned;

use super::ApiError;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// SignedBody: POST operations via signed JSON body
// ---------------------------------------------------------------------------

/// An Axum extractor that verifies the `Hireloop-Signature` header and
/// deserializes + authenticates the JSON request body.
///
/// # Header format
///
/// ```text
/// Hireloop-Signature: {unix_timestamp}.{base64_signature}
/// ```
///
/// The signature is computed as `HMAC-SHA256("{timestamp}.{json_body}", gateway_secret)`.
pub struct SignedBody<T: Signature>(pub T);

/// Errors that can occur during signature verification.
#[derive(Debug, thiserror::Error)]
pub enum SignedRequestError {
    #[error("missing Hireloop-Signature header")]
    MissingHeader,
    #[error("invalid Hireloop-Signature header format")]
    InvalidHeader,
    #[error("invalid signature encoding")]
    InvalidBase64,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("invalid JSON body: {0}")]
    JsonError(serde_json::Error),
    #[error("invalid query string: {0}")]
    QueryError(String),
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("signature expired")]
    Expired,
}

impl From<SignatureError> for SignedRequestError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidFormat => Self::InvalidHeader,
            SignatureError::InvalidBase64 => Self::InvalidBase64,
            SignatureError::Json(e) => Self::JsonError(e),
            SignatureError::SignatureMismatch => Self::VerificationFailed,
            SignatureError::Expired => Self::Expired,
        }
    }
}

impl From<SignedRequestError> for GatewayError {
    fn from(err: SignedRequestError) -> Self {
        match err {
            SignedRequestError::MissingHeader
            | SignedRequestError::VerificationFailed
            | SignedRequestError::Expired => GatewayError::unauthorized(err.to_string()),
            SignedRequestError::InvalidHeader
            | SignedRequestError::InvalidBase64
            | SignedRequestError::BodyReadError
            | SignedRequestError::JsonError(_)
            | SignedRequestError::QueryError(_) => GatewayError::validation(err.to_string()),
        }
    }
}

impl IntoResponse for SignedRequestError {
    fn into_response(self) -> Response {
        ApiError::from(GatewayError::from(self)).into_response()
    }
}

/// The raw `Hireloop-Signature` value, or `None` when it may be skipped.
async fn signature_header(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<Option<String>, SignedRequestError> {
    match headers.get(SIGNATURE_HEADER) {
        Some(value) => value
            .to_str()
            .map(|v| Some(v.to_owned()))
            .map_err(|_| SignedRequestError::InvalidHeader),
        None if state.config.gateway.read().await.require_signature => {
            Err(SignedRequestError::MissingHeader)
        }
        None => Ok(None),
    }
}

impl<T: Signature + Send> FromRequest<AppState> for SignedBody<T> {
    type Rejection = SignedRequestError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let header_value = signature_header(req.headers(), state).await?;

        let body_bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_| SignedRequestError::BodyReadError)?;

        let json = String::from_utf8(body_bytes.to_vec())
            .map_err(|_| SignedRequestError::BodyReadError)?;

        let Some(header_value) = header_value else {
            let body = serde_json::from_str(&json).map_err(SignedRequestError::JsonError)?;
            return Ok(SignedBody(body));
        };

        let signed = SignedObject::<T>::from_header_and_body(&header_value, json)?;

        let gateway = state.config.gateway.read().await;
        let verified_body = signed.verify(gateway.secret_bytes())?;
        drop(gateway);

        Ok(SignedBody(verified_body))
    }
}

// ---------------------------------------------------------------------------
// SignedQuery: GET queries via signed path
// ---------------------------------------------------------------------------

/// An Axum extractor that verifies the `Hireloop-Signature` header against
/// the full request path and query, then parses the query string into `T`.
///
/// The signature is computed as
/// `HMAC-SHA256("{path_and_query}.{timestamp}", gateway_secret)` where the
/// path is the one the caller sent, including the `/api/v1` prefix.
pub struct SignedQuery<T>(pub T);

impl<T: DeserializeOwned + Send> FromRequestParts<AppState> for SignedQuery<T> {
    type Rejection = SignedRequestError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = signature_header(&parts.headers, state).await?;

        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|OriginalUri(uri)| uri)
            .unwrap_or(&parts.uri);

        if let Some(header_value) = header_value {
            let (timestamp, signature_bytes) = signature::parse_signature_header(&header_value)?;
            let path_and_query = uri
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or_else(|| uri.path());

            let gateway = state.config.gateway.read().await;
            signature::verify_path(
                path_and_query,
                timestamp,
                &signature_bytes,
                gateway.secret_bytes(),
            )?;
            drop(gateway);
        }

        let Query(query) = Query::<T>::try_from_uri(uri)
            .map_err(|e| SignedRequestError::QueryError(e.body_text()))?;
        Ok(SignedQuery(query))
    }
}
