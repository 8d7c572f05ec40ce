//! HTTP APIs.
//!
//! - `/api/v1/service` – called by the platform backend, signed bodies
//! - `/api/v1/admin`   – operator console, admin secret header

pub mod admin;
pub mod extractors;
pub mod service;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fanpay_core::EngineError;
use fanpay_sdk::objects::{ErrorBody, ErrorCode};

/// HTTP status for a stable error code.
pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound | ErrorCode::AccountNotFound => StatusCode::NOT_FOUND,
        ErrorCode::DuplicateOperation => StatusCode::CONFLICT,
        ErrorCode::IntentNotSucceeded
        | ErrorCode::AmountMismatch
        | ErrorCode::InsufficientBalance
        | ErrorCode::AccountNotActive
        | ErrorCode::RetryExhausted => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::GatewayUnavailable => StatusCode::BAD_GATEWAY,
        ErrorCode::StoreUnavailable | ErrorCode::QueueOverflow => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::IntegrityViolation | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error response for an engine failure.
///
/// The public message never carries infrastructure detail; that goes to
/// the trace only.
pub(crate) fn engine_error_response(api: &'static str, e: &EngineError) -> Response {
    let status = status_for(e.code());
    if status.is_server_error() {
        tracing::error!(api, error = %e.detail(), "Request failed");
    } else {
        tracing::debug!(api, error = %e, "Request rejected");
    }
    (status, Json(e.to_body())).into_response()
}

pub(crate) fn error_response(status: StatusCode, code: ErrorCode, message: &str) -> Response {
    (status, Json(ErrorBody::new(code, message))).into_response()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::runtime::{OperatorCredentials, ServiceConfig, SharedConfig};
    use crate::server::build_router;
    use crate::state::AppState;
    use axum::Router;
    use fanpay_core::Engine;
    use fanpay_core::config::EngineConfig;
    use fanpay_core::gateway::HttpPaymentGateway;
    use fanpay_core::store::InMemoryLedgerStore;
    use std::sync::Arc;

    pub const ADMIN_SECRET: &str = "operator-password";
    pub const SERVICE_SECRET: &[u8] = b"service-secret-for-tests";

    /// Router over an in-memory store. The gateway points at a closed
    /// local port, so only routes that never reach it are exercised.
    pub fn test_app() -> (Router, AppState) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let gateway = Arc::new(HttpPaymentGateway::new(
            url::Url::parse("http://127.0.0.1:9/").unwrap(),
            "sk_test",
        ));
        let engine = Arc::new(Engine::new(EngineConfig::default(), store, gateway).unwrap());

        let admin = OperatorCredentials::hash_plaintext(ADMIN_SECRET).unwrap();
        let config = SharedConfig::new(admin, ServiceConfig::new(SERVICE_SECRET));

        let state = AppState::new(engine, config);
        (build_router(state.clone()), state)
    }

    pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
