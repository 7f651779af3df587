//! Gateway configuration.

/// Secret shared with the trusted upstream that signs inbound calls.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Secret key bytes for HMAC verification.
    pub secret: Box<[u8]>,
    /// When false, unsigned calls are accepted (local development only).
    pub require_signature: bool,
}

impl GatewayConfig {
    pub fn new(secret: impl Into<Box<[u8]>>, require_signature: bool) -> Self {
        Self {
            secret: secret.into(),
            require_signature,
        }
    }

    /// Get the secret key bytes for HMAC verification.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}
