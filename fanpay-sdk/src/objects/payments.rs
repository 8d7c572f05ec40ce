//! Payment and transaction objects.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ErrorBody;
use crate::signature::Signature;

/// Money-event category.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `fanpay-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Subscription,
    PayPerView,
    Tip,
    Payout,
    Merchandise,
    EphemeralContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Failed => write!(f, "failed"),
            TransactionStatus::Refunded => write!(f, "refunded"),
        }
    }
}

/// Service API body for `POST /payments`.
///
/// Sent by the platform backend once the gateway reports a payment intent as
/// confirmed. The engine re-verifies the intent with the gateway before any
/// ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPaymentRequest {
    pub payer_id: Uuid,
    pub beneficiary_id: Option<Uuid>,
    /// Integer minor currency units.
    pub amount: i64,
    pub category: Category,
    pub gateway_intent_id: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Signature for ProcessPaymentRequest {}

/// Outcome of a payment confirmation.
///
/// On failure `success` is false, `transaction_id` is absent and `error`
/// carries the stable code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub success: bool,
    pub transaction_id: Option<Uuid>,
    pub creator_earnings: Option<i64>,
    pub platform_fee: Option<i64>,
    /// True when the gateway intent had already been applied and nothing new
    /// was credited.
    #[serde(default)]
    pub replayed: bool,
    pub error: Option<ErrorBody>,
}

impl PaymentResult {
    pub fn failed(error: ErrorBody) -> Self {
        Self {
            success: false,
            transaction_id: None,
            creator_earnings: None,
            platform_fee: None,
            replayed: false,
            error: Some(error),
        }
    }
}

/// Service API body for `POST /transactions/refund`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub transaction_id: Uuid,
}

impl Signature for RefundRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub payer_id: Uuid,
    pub beneficiary_id: Option<Uuid>,
    pub category: Category,
    pub amount: i64,
    pub platform_fee: i64,
    pub creator_earnings: i64,
    pub status: TransactionStatus,
    pub description: String,
    pub gateway_intent_id: Option<String>,
    pub created_at: i64,
}
