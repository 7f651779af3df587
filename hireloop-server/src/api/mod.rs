//! Gateway HTTP API.
//!
//! Every endpoint is called by the trusted upstream that authenticated the
//! caller; POST bodies and GET paths are signed via the `Hireloop-Signature`
//! header.
//!
//! # Endpoints
//!
//! - `POST /createRequest`          – create a pending request
//! - `POST /updateRequest`          – edit details while pending
//! - `POST /acceptRequest`          – professional accepts (idempotent)
//! - `POST /selectProfessional`     – client binds one acceptor
//! - `POST /closeRequest`           – client closes without selecting
//! - `POST /completeRequest`        – selected professional finishes
//! - `POST /rateRequest`            – client rates and closes
//! - `POST /cancelRequest`          – owner or selected professional cancels
//! - `GET  /requestProfessionals`   – acceptors of a request, for its owner
//! - `GET  /request`                – full request view
//! - `GET  /professionalAcceptances` – one professional's acceptances

pub mod extractors;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use hireloop_core::gateway::GatewayError;
use hireloop_sdk::objects::{
    AcceptRequestBody, CancelRequestBody, CloseRequestBody, CompleteRequestBody,
    CreateRequestBody, ErrorKind, GetRequestQuery, ProfessionalAcceptancesQuery, RateRequestBody,
    RequestProfessionalsQuery, SelectProfessionalBody, UpdateRequestBody,
};

use crate::api::extractors::{SignedBody, SignedQuery};
use crate::state::AppState;

/// Build the gateway API router, mounted under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/createRequest", post(create_request))
        .route("/updateRequest", post(update_request))
        .route("/acceptRequest", post(accept_request))
        .route("/selectProfessional", post(select_professional))
        .route("/closeRequest", post(close_request))
        .route("/completeRequest", post(complete_request))
        .route("/rateRequest", post(rate_request))
        .route("/cancelRequest", post(cancel_request))
        .route("/requestProfessionals", get(request_professionals))
        .route("/request", get(get_request))
        .route("/professionalAcceptances", get(professional_acceptances))
}

/// HTTP wrapper around [`GatewayError`].
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_code(self.0.kind);
        if status.is_server_error() {
            tracing::error!(kind = ?self.0.kind, error = %self.0.message, "Gateway API error");
        } else {
            tracing::debug!(kind = ?self.0.kind, error = %self.0.message, "Gateway API rejection");
        }
        (status, Json(self.0.to_body())).into_response()
    }
}

/// `POST /createRequest`: 201 with the new id and `pending`.
async fn create_request(
    State(state): State<AppState>,
    SignedBody(body): SignedBody<CreateRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.gateway.create_request(body).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn update_request(
    State(state): State<AppState>,
    SignedBody(body): SignedBody<UpdateRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gateway.update_request(body).await?))
}

/// `POST /acceptRequest`: 201 for a new acceptance, 200 when the
/// professional had already accepted.
async fn accept_request(
    State(state): State<AppState>,
    SignedBody(body): SignedBody<AcceptRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.gateway.accept_request(body).await?;
    let status = if response.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(response)))
}

async fn select_professional(
    State(state): State<AppState>,
    SignedBody(body): SignedBody<SelectProfessionalBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gateway.select_professional(body).await?))
}

async fn close_request(
    State(state): State<AppState>,
    SignedBody(body): SignedBody<CloseRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gateway.close_request(body).await?))
}

async fn complete_request(
    State(state): State<AppState>,
    SignedBody(body): SignedBody<CompleteRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gateway.complete_request(body).await?))
}

async fn rate_request(
    State(state): State<AppState>,
    SignedBody(body): SignedBody<RateRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gateway.rate_request(body).await?))
}

async fn cancel_request(
    State(state): State<AppState>,
    SignedBody(body): SignedBody<CancelRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gateway.cancel_request(body).await?))
}

async fn request_professionals(
    State(state): State<AppState>,
    SignedQuery(query): SignedQuery<RequestProfessionalsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gateway.request_professionals(query).await?))
}

async fn get_request(
    State(state): State<AppState>,
    SignedQuery(query): SignedQuery<GetRequestQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gateway.get_request(query).await?))
}

async fn professional_acceptances(
    State(state): State<AppState>,
    SignedQuery(query): SignedQuery<ProfessionalAcceptancesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.gateway.professional_acceptances(query).await?))
}
