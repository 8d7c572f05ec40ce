pub mod admin;
pub mod creators;
pub mod payments;
pub mod payouts;

pub use admin::*;
pub use creators::*;
pub use payments::*;
pub use payouts::*;

use serde::{Deserialize, Serialize};

/// Stable, machine-readable error codes returned by every fanpay API.
///
/// The string form (`snake_case`) is part of the public contract and must not
/// change once released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    GatewayUnavailable,
    StoreUnavailable,
    IntentNotSucceeded,
    AmountMismatch,
    InsufficientBalance,
    AccountNotActive,
    AccountNotFound,
    IntegrityViolation,
    QueueOverflow,
    RetryExhausted,
    DuplicateOperation,
    NotFound,
    InvalidRequest,
    Forbidden,
    Unauthorized,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::GatewayUnavailable => "gateway_unavailable",
            ErrorCode::StoreUnavailable => "store_unavailable",
            ErrorCode::IntentNotSucceeded => "intent_not_succeeded",
            ErrorCode::AmountMismatch => "amount_mismatch",
            ErrorCode::InsufficientBalance => "insufficient_balance",
            ErrorCode::AccountNotActive => "account_not_active",
            ErrorCode::AccountNotFound => "account_not_found",
            ErrorCode::IntegrityViolation => "integrity_violation",
            ErrorCode::QueueOverflow => "queue_overflow",
            ErrorCode::RetryExhausted => "retry_exhausted",
            ErrorCode::DuplicateOperation => "duplicate_operation",
            ErrorCode::NotFound => "not_found",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error payload: a stable code plus a public message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_wire_form_matches_as_str() {
        for code in [
            ErrorCode::GatewayUnavailable,
            ErrorCode::InsufficientBalance,
            ErrorCode::DuplicateOperation,
            ErrorCode::Internal,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }
}
