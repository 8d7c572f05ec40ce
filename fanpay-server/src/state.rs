//! Application state shared across all request handlers.

use crate::config::runtime::SharedConfig;
use fanpay_core::Engine;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Credentials (can be reloaded via SIGHUP).
    pub config: SharedConfig,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, config: SharedConfig) -> Self {
        Self { engine, config }
    }
}
