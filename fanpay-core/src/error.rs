//! Engine error taxonomy.
//!
//! `Display` strings are the public messages. Raw infrastructure text is
//! carried separately in `detail` fields and only surfaces through
//! [`EngineError::detail`] in the operation log and tracing output.

use crate::gateway::GatewayError;
use crate::store::StoreError;
use fanpay_sdk::objects::{ErrorBody, ErrorCode};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("payment gateway unavailable")]
    GatewayUnavailable { detail: String },

    #[error("ledger store unavailable")]
    StoreUnavailable { detail: String },

    #[error("payment intent {intent_id} has not succeeded (status: {status})")]
    IntentNotSucceeded { intent_id: String, status: String },

    #[error("amount mismatch: requested {requested}, gateway reports {gateway}")]
    AmountMismatch { requested: i64, gateway: i64 },

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: i64, available: i64 },

    #[error("payout account for creator {creator_id} is not active")]
    AccountNotActive { creator_id: Uuid },

    #[error("no payout account registered for creator {creator_id}")]
    AccountNotFound { creator_id: Uuid },

    #[error("integrity violation: {reason}")]
    IntegrityViolation { reason: String },

    #[error("failover queue is full")]
    QueueOverflow,

    #[error("failover record {id} exhausted its retries after {attempts} attempts")]
    RetryExhausted { id: Uuid, attempts: u32 },

    #[error("duplicate operation: {key}")]
    DuplicateOperation { key: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("operator role required")]
    Forbidden,

    #[error("internal error")]
    Internal { detail: String },
}

impl EngineError {
    /// Stable code for API responses.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::GatewayUnavailable { .. } => ErrorCode::GatewayUnavailable,
            EngineError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            EngineError::IntentNotSucceeded { .. } => ErrorCode::IntentNotSucceeded,
            EngineError::AmountMismatch { .. } => ErrorCode::AmountMismatch,
            EngineError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            EngineError::AccountNotActive { .. } => ErrorCode::AccountNotActive,
            EngineError::AccountNotFound { .. } => ErrorCode::AccountNotFound,
            EngineError::IntegrityViolation { .. } => ErrorCode::IntegrityViolation,
            EngineError::QueueOverflow => ErrorCode::QueueOverflow,
            EngineError::RetryExhausted { .. } => ErrorCode::RetryExhausted,
            EngineError::DuplicateOperation { .. } => ErrorCode::DuplicateOperation,
            EngineError::NotFound { .. } => ErrorCode::NotFound,
            EngineError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            EngineError::Forbidden => ErrorCode::Forbidden,
            EngineError::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Transient infrastructure failures are captured by the failover queue;
    /// everything else is a definitive answer for the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::GatewayUnavailable { .. } | EngineError::StoreUnavailable { .. }
        )
    }

    /// Original failure text for internal diagnosis.
    pub fn detail(&self) -> String {
        match self {
            EngineError::GatewayUnavailable { detail }
            | EngineError::StoreUnavailable { detail }
            | EngineError::Internal { detail } => format!("{self}: {detail}"),
            other => other.to_string(),
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.code(), self.to_string())
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(key) => EngineError::DuplicateOperation { key },
            StoreError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            StoreError::Invalid(reason) => EngineError::IntegrityViolation { reason },
            other => EngineError::StoreUnavailable {
                detail: other.to_string(),
            },
        }
    }
}

impl From<GatewayError> for EngineError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NotFound(id) => EngineError::NotFound {
                entity: "gateway object",
                id,
            },
            e if e.is_transient() => EngineError::GatewayUnavailable {
                detail: e.to_string(),
            },
            e => EngineError::InvalidRequest(format!("payment gateway rejected the request ({e})")),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Internal {
            detail: format!("serialization error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_message_hides_infrastructure_text() {
        let err = EngineError::from(StoreError::Unavailable(
            "connection refused (os error 111)".to_string(),
        ));
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
        assert_eq!(err.to_string(), "ledger store unavailable");
        assert!(err.detail().contains("connection refused"));
        assert!(err.is_transient());
    }

    #[test]
    fn precondition_failures_are_not_transient() {
        let err = EngineError::InsufficientBalance {
            requested: 1000,
            available: 500,
        };
        assert!(!err.is_transient());
        assert_eq!(err.to_body().code, ErrorCode::InsufficientBalance);
    }

    #[test]
    fn gateway_errors_split_by_transience() {
        let transient = EngineError::from(GatewayError::Api {
            status: 503,
            message: "maintenance".to_string(),
        });
        assert_eq!(transient.code(), ErrorCode::GatewayUnavailable);

        let rejected = EngineError::from(GatewayError::Api {
            status: 400,
            message: "bad destination".to_string(),
        });
        assert_eq!(rejected.code(), ErrorCode::InvalidRequest);
    }
}
