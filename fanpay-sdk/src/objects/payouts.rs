//! Payout objects.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ErrorCode;
use crate::signature::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    InTransit,
    Paid,
    Failed,
    Cancelled,
}

impl PayoutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PayoutStatus::Paid | PayoutStatus::Failed | PayoutStatus::Cancelled
        )
    }
}

/// Service API body for `POST /payouts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatePayoutRequest {
    pub creator_id: Uuid,
    pub amount: i64,
}

impl Signature for InitiatePayoutRequest {}

/// Service API body for `POST /payouts/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPayoutRequest {
    pub payout_id: Uuid,
}

impl Signature for GetPayoutRequest {}

/// Service API body for creator-scoped reads (`/creators/payouts`,
/// `/creators/balance`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorRequest {
    pub creator_id: Uuid,
}

impl Signature for CreatorRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutResponse {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub gateway_transfer_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PayoutStatus,
    pub arrival_date: Option<i64>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub creator_id: Uuid,
    /// Sum of creator earnings over completed transactions.
    pub payout_balance: i64,
    /// Payouts already pending, in transit or paid.
    pub committed: i64,
    pub available: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPayoutFailure {
    pub creator_id: Uuid,
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPayoutResult {
    pub successful: u32,
    pub failed: u32,
    pub total_amount: i64,
    pub failures: Vec<BatchPayoutFailure>,
}
