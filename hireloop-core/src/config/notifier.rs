//! Notification collaborator configuration.

use url::Url;

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Where lifecycle events are POSTed. `None` means log only.
    pub url: Option<Url>,
    /// Secret key bytes for HMAC signing of event bodies.
    pub secret: Box<[u8]>,
    /// Delivery attempts per event before it is dropped.
    pub max_attempts: u32,
}

impl NotifierConfig {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

    pub fn disabled() -> Self {
        Self {
            url: None,
            secret: Box::default(),
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}
