//! Runtime configuration types for Hireloop.
//!
//! These types represent the validated runtime configuration shared by the
//! core and the server. Loading and parsing the TOML file is handled by the
//! server crate.

mod config_store;
mod gateway;
mod lifecycle;
mod notifier;
mod server;

pub use config_store::ConfigStore;
pub use gateway::GatewayConfig;
pub use lifecycle::LifecyclePolicy;
pub use notifier::NotifierConfig;
pub use server::{ServerConfig, StorageBackend, StorageConfig};

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared configuration state with separate locks for each section.
///
/// `lifecycle` and `storage` are fixed for the lifetime of the process; the
/// other sections are replaced on SIGHUP.
#[derive(Clone)]
pub struct SharedConfig {
    /// Server configuration (listen address).
    pub server: Arc<RwLock<ServerConfig>>,
    /// Request signing for inbound calls.
    pub gateway: Arc<RwLock<GatewayConfig>>,
    /// Notification collaborator endpoint, watched by the sender.
    pub notifier: ConfigStore<NotifierConfig>,
    pub lifecycle: LifecyclePolicy,
    pub storage: StorageConfig,
}
