//! Request/response boundary between wire callers and the lifecycle engine.
//!
//! The gateway only translates: wire bodies become engine calls, engine
//! results become wire responses, and engine errors become [`GatewayError`]
//! with the taxonomy callers see.

use crate::entities::service_request::{RequestDetails, RequestDetailsPatch};
use crate::lifecycle::{LifecycleEngine, LifecycleError};
use hireloop_sdk::objects::{
    AcceptRequestBody, AcceptRequestResponse, CancelRequestBody, CloseRequestBody,
    CompleteRequestBody, CreateRequestBody, CreateRequestResponse, ErrorBody, ErrorKind,
    GetRequestQuery, ProfessionalAcceptancesQuery, ProfessionalAcceptancesResponse,
    RateRequestBody, RequestProfessionalsQuery, RequestProfessionalsResponse, RequestStatus,
    RequestView, SelectProfessionalBody, SelectProfessionalResponse, StatusResponse,
    UpdateRequestBody, UpdateRequestResponse,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    /// Authoritative request status, when the request exists.
    pub status: Option<RequestStatus>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.kind,
            message: self.message.clone(),
            status: self.status,
        }
    }
}

impl From<LifecycleError> for GatewayError {
    fn from(err: LifecycleError) -> Self {
        Self {
            kind: err.kind(),
            message: err.message().to_string(),
            status: err.status().map(Into::into),
        }
    }
}

#[derive(Clone)]
pub struct Gateway {
    engine: Arc<LifecycleEngine>,
}

impl Gateway {
    pub fn new(engine: Arc<LifecycleEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &LifecycleEngine {
        &self.engine
    }

    pub async fn create_request(
        &self,
        body: CreateRequestBody,
    ) -> Result<CreateRequestResponse, GatewayError> {
        let details = RequestDetails {
            category: body.category,
            description: body.description,
            location: body.location,
            urgency: body.urgency.into(),
        };
        let request = self
            .engine
            .create_request(body.client_id, details, body.idempotency_key)
            .await?;
        Ok(CreateRequestResponse {
            id: request.id,
            status: request.status.into(),
        })
    }

    pub async fn update_request(
        &self,
        body: UpdateRequestBody,
    ) -> Result<UpdateRequestResponse, GatewayError> {
        let patch = RequestDetailsPatch {
            category: body.category,
            description: body.description,
            location: body.location,
            urgency: body.urgency.map(Into::into),
        };
        let request = self
            .engine
            .update_request_details(body.request_id, body.client_id, patch, body.idempotency_key)
            .await?;
        Ok(UpdateRequestResponse {
            id: request.id,
            status: request.status.into(),
        })
    }

    pub async fn accept_request(
        &self,
        body: AcceptRequestBody,
    ) -> Result<AcceptRequestResponse, GatewayError> {
        let outcome = self
            .engine
            .accept_request(body.request_id, body.professional_id, body.idempotency_key)
            .await?;
        Ok(AcceptRequestResponse {
            acceptance_id: outcome.acceptance.id,
            status: outcome.status.into(),
            outcome: outcome.acceptance.outcome.into(),
            duplicate: outcome.duplicate,
        })
    }

    pub async fn select_professional(
        &self,
        body: SelectProfessionalBody,
    ) -> Result<SelectProfessionalResponse, GatewayError> {
        let request = self
            .engine
            .select_professional(
                body.request_id,
                body.client_id,
                body.professional_id,
                body.idempotency_key,
            )
            .await?;
        Ok(SelectProfessionalResponse {
            status: request.status.into(),
            selected_professional_id: request.selected_professional_id,
        })
    }

    pub async fn close_request(
        &self,
        body: CloseRequestBody,
    ) -> Result<StatusResponse, GatewayError> {
        let request = self
            .engine
            .close_without_selection(
                body.request_id,
                body.client_id,
                body.reason,
                body.idempotency_key,
            )
            .await?;
        Ok(StatusResponse {
            status: request.status.into(),
        })
    }

    pub async fn complete_request(
        &self,
        body: CompleteRequestBody,
    ) -> Result<StatusResponse, GatewayError> {
        let request = self
            .engine
            .complete_by_professional(body.request_id, body.professional_id, body.idempotency_key)
            .await?;
        Ok(StatusResponse {
            status: request.status.into(),
        })
    }

    pub async fn rate_request(&self, body: RateRequestBody) -> Result<StatusResponse, GatewayError> {
        let request = self
            .engine
            .rate_and_close(
                body.request_id,
                body.client_id,
                body.rating,
                body.comment,
                body.idempotency_key,
            )
            .await?;
        Ok(StatusResponse {
            status: request.status.into(),
        })
    }

    pub async fn cancel_request(
        &self,
        body: CancelRequestBody,
    ) -> Result<StatusResponse, GatewayError> {
        let request = self
            .engine
            .cancel_request(
                body.request_id,
                body.caller_id,
                body.reason,
                body.idempotency_key,
            )
            .await?;
        Ok(StatusResponse {
            status: request.status.into(),
        })
    }

    pub async fn request_professionals(
        &self,
        query: RequestProfessionalsQuery,
    ) -> Result<RequestProfessionalsResponse, GatewayError> {
        let aggregate = self
            .engine
            .list_professionals(query.request_id, query.client_id)
            .await?;
        Ok(RequestProfessionalsResponse {
            professionals: aggregate.ledger.list().iter().map(|a| a.to_view()).collect(),
            request_status: aggregate.status().into(),
            selected_professional_id: aggregate.request.selected_professional_id,
        })
    }

    pub async fn get_request(&self, query: GetRequestQuery) -> Result<RequestView, GatewayError> {
        let request = self
            .engine
            .get_request(query.request_id, query.caller_id)
            .await?;
        Ok(request.to_view())
    }

    pub async fn professional_acceptances(
        &self,
        query: ProfessionalAcceptancesQuery,
    ) -> Result<ProfessionalAcceptancesResponse, GatewayError> {
        let rows = self
            .engine
            .list_acceptances_for(query.professional_id)
            .await?;
        Ok(ProfessionalAcceptancesResponse {
            acceptances: rows.iter().map(|row| row.to_view()).collect(),
        })
    }
}
