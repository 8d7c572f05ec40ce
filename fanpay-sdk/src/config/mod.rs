//! Credential configuration shared by the server and its clients.

/// Shared secret the platform backend uses to sign service API bodies.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    secret: Box<[u8]>,
}

impl ServiceConfig {
    pub fn new(secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Get the secret key bytes for HMAC signing.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}
