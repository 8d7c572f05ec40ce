//! Configuration held by the running server.
//!
//! Credentials are reloadable on SIGHUP, each behind its own lock.

pub use super::credentials::OperatorCredentials;
pub use fanpay_sdk::config::ServiceConfig;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: Url,
}

/// Reloadable sections shared with request handlers.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    pub admin: Arc<RwLock<OperatorCredentials>>,
    pub service: Arc<RwLock<ServiceConfig>>,
}

impl SharedConfig {
    pub fn new(admin: OperatorCredentials, service: ServiceConfig) -> Self {
        Self {
            admin: Arc::new(RwLock::new(admin)),
            service: Arc::new(RwLock::new(service)),
        }
    }
}
