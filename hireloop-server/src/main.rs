//! Hireloop Server
//!
//! Service request lifecycle gateway: clients post requests, professionals
//! accept them, the client selects one, and the job runs to rating or
//! cancellation.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::file::LogFormat;
use config::{ConfigLoader, get_database_url};
use hireloop_core::config::{StorageBackend, StorageConfig};
use hireloop_core::events::{EventEmitter, lifecycle_event_channel};
use hireloop_core::gateway::Gateway;
use hireloop_core::lifecycle::LifecycleEngine;
use hireloop_core::processors::NotificationSender;
use hireloop_core::store::{MemoryStore, PostgresStore, RequestStore};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Hireloop - service request lifecycle gateway
#[derive(Parser, Debug)]
#[command(name = "hireloop-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "HIRELOOP_CONFIG", default_value = "./hireloop-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long, env = "HIRELOOP_LISTEN")]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration; the logging section decides the subscriber format
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load()?;

    init_tracing(loaded_config.log_format);

    tracing::info!("Starting hireloop-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Configuration loaded from {:?}", args.config);

    let listen_addr = loaded_config.server.listen;

    // Convert to shared config with separate locks for each section
    let shared_config = loaded_config.into_shared();

    let (store, db_pool) = open_store(&shared_config.storage, args.migrate).await?;

    // Wire the engine to the notification sender
    let (events_tx, events_rx) = lifecycle_event_channel(shared_config.lifecycle.event_buffer);
    let engine = LifecycleEngine::new(
        store,
        EventEmitter::new(events_tx),
        shared_config.lifecycle.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let notification_sender =
        NotificationSender::new(events_rx, shutdown_rx, shared_config.notifier.clone());
    let notifier_handle = tokio::spawn(notification_sender.run());

    // Create application state
    let state = AppState::new(Gateway::new(Arc::new(engine)), shared_config.clone());

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(shared_config, config_loader);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Signal the config reload handler and the notification sender to stop
    reload_notify.notify_one();
    if shutdown_tx.send(true).is_err() {
        tracing::debug!("NotificationSender already stopped");
    }
    if let Err(e) = notifier_handle.await {
        tracing::error!(error = %e, "NotificationSender task failed");
    }

    // Close database connections gracefully
    if let Some(db_pool) = db_pool {
        tracing::info!("Closing database connections...");
        db_pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Open the configured request store. The pool is returned so it can be
/// closed on shutdown.
async fn open_store(
    storage: &StorageConfig,
    migrate: bool,
) -> anyhow::Result<(Arc<dyn RequestStore>, Option<PgPool>)> {
    match storage.backend {
        StorageBackend::Memory => {
            if migrate {
                tracing::warn!("--migrate ignored: storage backend is memory");
            }
            tracing::warn!("Using in-memory store, requests are lost on restart");
            Ok((Arc::new(MemoryStore::new()), None))
        }
        StorageBackend::Postgres => {
            // Get database URL from environment
            let database_url = get_database_url().map_err(|e| {
                tracing::error!("DATABASE_URL environment variable not set");
                e
            })?;

            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(storage.max_connections)
                .connect(&database_url)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to database: {}", e);
                    e
                })?;
            tracing::info!("Database connection established");

            if migrate {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("../migrations")
                    .run(&db_pool)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to run migrations: {}", e);
                        e
                    })?;
                tracing::info!("Migrations completed successfully");
            }

            Ok((Arc::new(PostgresStore::new(db_pool.clone())), Some(db_pool)))
        }
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
