//! Gateway client (trusted upstream → Hireloop server).
//!
//! POST bodies are signed with `HMAC-SHA256("{timestamp}.{json}", secret)`,
//! GET queries with `HMAC-SHA256("{path_and_query}.{timestamp}", secret)`.

use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use super::ClientError;
use crate::objects::{
    AcceptRequestBody, AcceptRequestResponse, CancelRequestBody, CloseRequestBody,
    CompleteRequestBody, CreateRequestBody, CreateRequestResponse, ErrorBody,
    ProfessionalAcceptancesResponse, RateRequestBody, RequestProfessionalsResponse, RequestView,
    SelectProfessionalBody, SelectProfessionalResponse, StatusResponse, UpdateRequestBody,
    UpdateRequestResponse,
};
use crate::signature::{SIGNATURE_HEADER, Signature, SignedObject, sign_path};

/// Typed HTTP client for the Hireloop gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: Url,
    secret: Vec<u8>,
}

impl GatewayClient {
    /// Create a new `GatewayClient`.
    ///
    /// * `base_url` – root URL of the Hireloop server (e.g. `https://jobs.example.com`).
    /// * `secret` – the shared HMAC secret configured as `gateway.secret`.
    pub fn new(base_url: Url, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            secret: secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/createRequest`
    pub async fn create_request(
        &self,
        body: CreateRequestBody,
    ) -> Result<CreateRequestResponse, ClientError> {
        self.post("/api/v1/createRequest", body).await
    }

    /// `POST /api/v1/updateRequest`
    pub async fn update_request(
        &self,
        body: UpdateRequestBody,
    ) -> Result<UpdateRequestResponse, ClientError> {
        self.post("/api/v1/updateRequest", body).await
    }

    /// `POST /api/v1/acceptRequest`
    pub async fn accept_request(
        &self,
        body: AcceptRequestBody,
    ) -> Result<AcceptRequestResponse, ClientError> {
        self.post("/api/v1/acceptRequest", body).await
    }

    /// `POST /api/v1/selectProfessional`
    pub async fn select_professional(
        &self,
        body: SelectProfessionalBody,
    ) -> Result<SelectProfessionalResponse, ClientError> {
        self.post("/api/v1/selectProfessional", body).await
    }

    /// `POST /api/v1/closeRequest`
    pub async fn close_request(
        &self,
        body: CloseRequestBody,
    ) -> Result<StatusResponse, ClientError> {
        self.post("/api/v1/closeRequest", body).await
    }

    /// `POST /api/v1/completeRequest`
    pub async fn complete_request(
        &self,
        body: CompleteRequestBody,
    ) -> Result<StatusResponse, ClientError> {
        self.post("/api/v1/completeRequest", body).await
    }

    /// `POST /api/v1/rateRequest`
    pub async fn rate_request(&self, body: RateRequestBody) -> Result<StatusResponse, ClientError> {
        self.post("/api/v1/rateRequest", body).await
    }

    /// `POST /api/v1/cancelRequest`
    pub async fn cancel_request(
        &self,
        body: CancelRequestBody,
    ) -> Result<StatusResponse, ClientError> {
        self.post("/api/v1/cancelRequest", body).await
    }

    /// `GET /api/v1/requestProfessionals`
    pub async fn request_professionals(
        &self,
        request_id: Uuid,
        client_id: Uuid,
    ) -> Result<RequestProfessionalsResponse, ClientError> {
        let path = format!(
            "/api/v1/requestProfessionals?requestId={}&clientId={}",
            urlencoding::encode(&request_id.to_string()),
            urlencoding::encode(&client_id.to_string()),
        );
        self.get(&path).await
    }

    /// `GET /api/v1/request`
    pub async fn get_request(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
    ) -> Result<RequestView, ClientError> {
        let path = format!(
            "/api/v1/request?requestId={}&callerId={}",
            urlencoding::encode(&request_id.to_string()),
            urlencoding::encode(&caller_id.to_string()),
        );
        self.get(&path).await
    }

    /// `GET /api/v1/professionalAcceptances`
    pub async fn professional_acceptances(
        &self,
        professional_id: Uuid,
    ) -> Result<ProfessionalAcceptancesResponse, ClientError> {
        let path = format!(
            "/api/v1/professionalAcceptances?professionalId={}",
            urlencoding::encode(&professional_id.to_string()),
        );
        self.get(&path).await
    }

    async fn post<B, R>(&self, path: &str, body: B) -> Result<R, ClientError>
    where
        B: Signature,
        R: DeserializeOwned,
    {
        let signed = SignedObject::new(body, &self.secret).map_err(ClientError::Json)?;
        let url = self.base_url.join(path)?;

        let resp = self
            .http
            .post(url)
            .header(SIGNATURE_HEADER, signed.to_header())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(signed.json)
            .send()
            .await?;

        parse_response(resp).await
    }

    async fn get<R: DeserializeOwned>(&self, path_and_query: &str) -> Result<R, ClientError> {
        let url = self.base_url.join(path_and_query)?;
        let sig = sign_path(path_and_query, &self.secret);

        let resp = self
            .http
            .get(url)
            .header(SIGNATURE_HEADER, sig)
            .send()
            .await?;

        parse_response(resp).await
    }
}

async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(match serde_json::from_str::<ErrorBody>(&body) {
            Ok(body) => ClientError::Gateway { status, body },
            Err(_) => ClientError::Api { status, body },
        });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
