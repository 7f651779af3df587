//! Operation request and response bodies.
//!
//! Every response carries the resulting request status so callers can
//! reconcile their local state instead of blindly retrying.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AcceptanceOutcome, RequestStatus, Urgency};
use crate::signature::Signature;

/// `POST /createRequest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    pub client_id: Uuid,
    pub category: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Signature for CreateRequestBody {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestResponse {
    pub id: Uuid,
    pub status: RequestStatus,
}

/// `POST /updateRequest`: only while the request is still pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequestBody {
    pub request_id: Uuid,
    pub client_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Signature for UpdateRequestBody {}

pub type UpdateRequestResponse = CreateRequestResponse;

/// `POST /acceptRequest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRequestBody {
    pub request_id: Uuid,
    pub professional_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Signature for AcceptRequestBody {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRequestResponse {
    pub acceptance_id: Uuid,
    pub status: RequestStatus,
    pub outcome: AcceptanceOutcome,
    /// `true` when this professional had already accepted and the existing
    /// acceptance was returned.
    pub duplicate: bool,
}

/// `POST /selectProfessional`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectProfessionalBody {
    pub request_id: Uuid,
    pub client_id: Uuid,
    pub professional_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Signature for SelectProfessionalBody {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectProfessionalResponse {
    pub status: RequestStatus,
    pub selected_professional_id: Option<Uuid>,
}

/// `POST /closeRequest`: close without selecting anyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseRequestBody {
    pub request_id: Uuid,
    pub client_id: Uuid,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Signature for CloseRequestBody {}

/// `POST /completeRequest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequestBody {
    pub request_id: Uuid,
    pub professional_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Signature for CompleteRequestBody {}

/// `POST /rateRequest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRequestBody {
    pub request_id: Uuid,
    pub client_id: Uuid,
    pub rating: u8,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Signature for RateRequestBody {}

/// `POST /cancelRequest`
///
/// `caller_id` is either the owning client or the selected professional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequestBody {
    pub request_id: Uuid,
    pub caller_id: Uuid,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Signature for CancelRequestBody {}

/// Response of every transition that only reports the resulting status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: RequestStatus,
}

/// `GET /requestProfessionals?requestId=..&clientId=..`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestProfessionalsQuery {
    pub request_id: Uuid,
    pub client_id: Uuid,
}

/// One professional who accepted a request, as shown to the owning client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceView {
    pub acceptance_id: Uuid,
    pub professional_id: Uuid,
    /// Unix timestamp.
    pub accepted_at: i64,
    pub outcome: AcceptanceOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestProfessionalsResponse {
    /// Ordered by acceptance time, earliest first.
    pub professionals: Vec<AcceptanceView>,
    pub request_status: RequestStatus,
    pub selected_professional_id: Option<Uuid>,
}

/// `GET /request?requestId=..&callerId=..`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRequestQuery {
    pub request_id: Uuid,
    pub caller_id: Uuid,
}

/// Full view of a service request. Also used as the event snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: Uuid,
    pub client_id: Uuid,
    pub category: String,
    pub description: String,
    pub location: String,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub selected_professional_id: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
    pub closed_at: Option<i64>,
    pub close_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub rating: Option<u8>,
    pub rating_comment: Option<String>,
}

/// `GET /professionalAcceptances?professionalId=..`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalAcceptancesQuery {
    pub professional_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalAcceptanceView {
    pub acceptance_id: Uuid,
    pub request_id: Uuid,
    pub accepted_at: i64,
    pub outcome: AcceptanceOutcome,
    pub request_status: RequestStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalAcceptancesResponse {
    pub acceptances: Vec<ProfessionalAcceptanceView>,
}
