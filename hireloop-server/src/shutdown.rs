//! Signal handling for graceful shutdown and config reload.

use crate::config::ConfigLoader;
use hireloop_core::config::SharedConfig;
use std::sync::Arc;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::Notify;

/// Wait for `kind`, or forever if the handler cannot be installed.
async fn wait_for(kind: SignalKind, name: &str) {
    match signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install {} handler", name);
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    tokio::select! {
        _ = wait_for(SignalKind::terminate(), "SIGTERM") => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = wait_for(SignalKind::interrupt(), "SIGINT") => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Spawns a task that listens for SIGHUP and reloads the configuration.
///
/// Server, gateway and notifier sections are swapped in place; lifecycle
/// and storage settings only take effect on restart.
///
/// Returns a Notify that can be used to signal when shutdown is complete.
pub fn spawn_config_reload_handler(
    config: SharedConfig,
    config_loader: Arc<ConfigLoader>,
) -> Arc<Notify> {
    let shutdown_notify = Arc::new(Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();

    tokio::spawn(async move {
        let mut sighup: Signal = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler, reload disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    tracing::info!("Received SIGHUP, reloading configuration");
                    match config_loader.reload() {
                        Ok(loaded_config) => {
                            if loaded_config.lifecycle != config.lifecycle
                                || loaded_config.storage.backend != config.storage.backend
                            {
                                tracing::warn!(
                                    "Lifecycle and storage changes require a restart and were ignored"
                                );
                            }
                            *config.server.write().await = loaded_config.server;
                            *config.gateway.write().await = loaded_config.gateway;
                            config.notifier.update(loaded_config.notifier).await;

                            tracing::info!(
                                notifier_version = config.notifier.version(),
                                "Configuration reloaded successfully"
                            );
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload configuration: {}", e);
                        }
                    }
                }
                _ = shutdown_notify_clone.notified() => {
                    tracing::debug!("Config reload handler shutting down");
                    break;
                }
            }
        }
    });

    shutdown_notify
}
