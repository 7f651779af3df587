//! TOML file configuration structures.
//!
//! These structs directly map to the `hireloop-config.toml` file format.

use serde::Deserialize;
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

/// Storage section. Postgres reads its URL from `DATABASE_URL`.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

/// Gateway section: the secret shared with the upstream that signs calls.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub secret: String,
    #[serde(default = "default_true")]
    pub require_signature: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub min_comment_len: usize,
    pub max_field_len: usize,
    pub lock_timeout_ms: u64,
    pub store_retry_attempts: u32,
    pub event_buffer: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_comment_len: 10,
            max_field_len: 2000,
            lock_timeout_ms: 5000,
            store_retry_attempts: 3,
            event_buffer: 256,
        }
    }
}

/// Notification collaborator. Without `url`, events are only logged.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub url: Option<Url>,
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: String::new(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_attempts() -> u32 {
    hireloop_core::config::NotifierConfig::DEFAULT_MAX_ATTEMPTS
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}
