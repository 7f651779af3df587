//! Configuration module for hireloop-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{FileConfig, LogFormat};
use hireloop_core::config::{
    ConfigStore, GatewayConfig, LifecyclePolicy, NotifierConfig, ServerConfig, SharedConfig,
    StorageBackend, StorageConfig,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    pub lifecycle: LifecyclePolicy,
    pub notifier: NotifierConfig,
    pub log_format: LogFormat,
}

impl LoadedConfig {
    /// Convert into a SharedConfig with Arc<RwLock<T>> wrappers.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig {
            server: Arc::new(RwLock::new(self.server)),
            gateway: Arc::new(RwLock::new(self.gateway)),
            notifier: ConfigStore::new(self.notifier),
            lifecycle: self.lifecycle,
            storage: self.storage,
        }
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read the TOML file, apply CLI overrides, validate, and build the
    /// runtime configuration.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        Ok(build_loaded_config(file_config))
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.gateway.require_signature && config.gateway.secret.is_empty() {
        return Err(ConfigError::ValidationError(
            "gateway.secret must be set when gateway.require_signature is true".to_string(),
        ));
    }

    let lifecycle = &config.lifecycle;
    if lifecycle.max_field_len == 0 {
        return Err(ConfigError::ValidationError(
            "lifecycle.max_field_len must be positive".to_string(),
        ));
    }
    if lifecycle.min_comment_len > lifecycle.max_field_len {
        return Err(ConfigError::ValidationError(format!(
            "lifecycle.min_comment_len ({}) exceeds lifecycle.max_field_len ({})",
            lifecycle.min_comment_len, lifecycle.max_field_len
        )));
    }
    if lifecycle.event_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "lifecycle.event_buffer must be positive".to_string(),
        ));
    }
    if lifecycle.store_retry_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "lifecycle.store_retry_attempts must be at least 1".to_string(),
        ));
    }

    if config.storage.max_connections == 0 {
        return Err(ConfigError::ValidationError(
            "storage.max_connections must be positive".to_string(),
        ));
    }

    if let Some(url) = &config.notifier.url {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "notifier.url must be http or https, got {}",
                url.scheme()
            )));
        }
        if config.notifier.secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "notifier.secret must be set when notifier.url is configured".to_string(),
            ));
        }
    }
    if config.notifier.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "notifier.max_attempts must be at least 1".to_string(),
        ));
    }

    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let lifecycle = file_config.lifecycle;
    LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
        },
        storage: StorageConfig {
            backend: match file_config.storage.backend {
                file::StorageBackend::Memory => StorageBackend::Memory,
                file::StorageBackend::Postgres => StorageBackend::Postgres,
            },
            max_connections: file_config.storage.max_connections,
        },
        gateway: GatewayConfig::new(
            file_config.gateway.secret.into_bytes(),
            file_config.gateway.require_signature,
        ),
        lifecycle: LifecyclePolicy {
            min_comment_len: lifecycle.min_comment_len,
            max_field_len: lifecycle.max_field_len,
            lock_timeout: Duration::from_millis(lifecycle.lock_timeout_ms),
            store_retry_attempts: lifecycle.store_retry_attempts,
            event_buffer: lifecycle.event_buffer,
        },
        notifier: NotifierConfig {
            url: file_config.notifier.url,
            secret: file_config.notifier.secret.into_bytes().into_boxed_slice(),
            max_attempts: file_config.notifier.max_attempts,
        },
        log_format: file_config.logging.format,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_builds_runtime_config() {
        let file = write_config(
            r#"
[gateway]
secret = "upstream"

[lifecycle]
lock_timeout_ms = 750

[notifier]
url = "http://127.0.0.1:9000/events"
secret = "notify"
"#,
        );
        let loaded = ConfigLoader::new(file.path(), None).load().unwrap();
        assert_eq!(loaded.gateway.secret_bytes(), b"upstream");
        assert!(loaded.gateway.require_signature);
        assert_eq!(loaded.lifecycle.lock_timeout, Duration::from_millis(750));
        assert_eq!(loaded.lifecycle.min_comment_len, 10);
        assert_eq!(loaded.notifier.secret_bytes(), b"notify");
        assert_eq!(loaded.storage.backend, StorageBackend::Memory);
        assert_eq!(loaded.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_listen_override_wins() {
        let file = write_config("[server]\nlisten = \"127.0.0.1:3000\"\n[gateway]\nsecret = \"s\"\n");
        let listen: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let loaded = ConfigLoader::new(file.path(), Some(listen)).load().unwrap();
        assert_eq!(loaded.server.listen, listen);
    }

    #[test]
    fn test_signature_requires_secret() {
        let file = write_config("[gateway]\nsecret = \"\"\n");
        let err = ConfigLoader::new(file.path(), None).load().err().unwrap();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let file = write_config("[gateway]\nsecret = \"\"\nrequire_signature = false\n");
        assert!(ConfigLoader::new(file.path(), None).load().is_ok());
    }

    #[test]
    fn test_rejects_inconsistent_lifecycle() {
        let file = write_config(
            "[gateway]\nsecret = \"s\"\n[lifecycle]\nmin_comment_len = 50\nmax_field_len = 20\n",
        );
        let err = ConfigLoader::new(file.path(), None).load().err().unwrap();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let file = write_config("[gateway]\nsecret = \"s\"\n[lifecycle]\nevent_buffer = 0\n");
        assert!(ConfigLoader::new(file.path(), None).load().is_err());
    }

    #[test]
    fn test_notifier_url_needs_secret() {
        let file = write_config(
            "[gateway]\nsecret = \"s\"\n[notifier]\nurl = \"https://notify.example.com\"\n",
        );
        let err = ConfigLoader::new(file.path(), None).load().err().unwrap();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ConfigLoader::new("/nonexistent/hireloop-config.toml", None)
            .load()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[tokio::test]
    async fn test_into_shared_keeps_sections() {
        let file = write_config("[gateway]\nsecret = \"s\"\n[storage]\nmax_connections = 3\n");
        let shared = ConfigLoader::new(file.path(), None)
            .load()
            .unwrap()
            .into_shared();
        assert_eq!(shared.gateway.read().await.secret_bytes(), b"s");
        assert_eq!(shared.storage.max_connections, 3);
        assert!(shared.notifier.read().await.url.is_none());
    }
}
