//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use hireloop_core::config::StorageBackend;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api::router())
        .with_state(state)
}

/// Liveness plus the deployment facts an operator checks first.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    storage: &'static str,
    signatures_required: bool,
    notifier_enabled: bool,
    /// Requests with a mutation in flight or queued.
    locked_requests: usize,
}

fn backend_name(backend: StorageBackend) -> &'static str {
    match backend {
        StorageBackend::Memory => "memory",
        StorageBackend::Postgres => "postgres",
    }
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let signatures_required = state.config.gateway.read().await.require_signature;
    let notifier_enabled = state.config.notifier.read().await.url.is_some();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        storage: backend_name(state.config.storage.backend),
        signatures_required,
        notifier_enabled,
        locked_requests: state.gateway.engine().locks().len(),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
