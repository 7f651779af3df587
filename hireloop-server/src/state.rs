//! Application state shared across all request handlers.

use hireloop_core::config::SharedConfig;
use hireloop_core::gateway::Gateway;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Operation surface of the lifecycle engine.
    pub gateway: Gateway,
    /// Runtime configuration (sections reloaded via SIGHUP).
    pub config: SharedConfig,
}

impl AppState {
    pub fn new(gateway: Gateway, config: SharedConfig) -> Self {
        Self { gateway, config }
    }
}
