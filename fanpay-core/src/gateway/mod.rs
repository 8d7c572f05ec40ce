//! External payment gateway seam.
//!
//! The gateway is the source of truth for card charges, transfers to creator
//! accounts and the state of connected payout accounts. The engine never
//! trusts client-reported outcomes; every money movement is confirmed here.

pub mod http;
pub mod timed;

pub use http::HttpPaymentGateway;
pub use timed::TimedPaymentGateway;

use crate::entities::{AccountStatus, PayoutStatus};
use crate::utils::timeout::TimeoutError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway call timed out after {0:?}")]
    Timeout(Duration),
    #[error("gateway returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("gateway object not found: {0}")]
    NotFound(String),
    #[error("gateway response parsing error: {0}")]
    Parse(String),
}

impl GatewayError {
    /// Connectivity problems, deadlines, throttling and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Request(_) | GatewayError::Timeout(_) => true,
            GatewayError::Api { status, .. } => *status == 429 || *status >= 500,
            GatewayError::NotFound(_) | GatewayError::Parse(_) => false,
        }
    }
}

impl TimeoutError for GatewayError {
    fn timed_out(limit: Duration) -> Self {
        GatewayError::Timeout(limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::RequiresPaymentMethod => "requires_payment_method",
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::Processing => "processing",
            IntentStatus::RequiresCapture => "requires_capture",
            IntentStatus::Canceled => "canceled",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub amount: i64,
    pub currency: String,
    /// Connected account receiving the funds.
    pub destination: String,
    /// Reusing the key makes a repeated request return the original transfer.
    pub idempotency_key: Uuid,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub transfer_id: String,
}

/// Transfer state as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayTransfer {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: PayoutStatus,
    /// Unix seconds.
    pub arrival_date: Option<i64>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedAccountRequest {
    pub creator_id: Uuid,
    pub email: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedAccount {
    pub id: String,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
    pub disabled_reason: Option<String>,
}

impl ConnectedAccount {
    pub fn status(&self) -> AccountStatus {
        if self.payouts_enabled {
            AccountStatus::Active
        } else if self.disabled_reason.is_some() {
            AccountStatus::Inactive
        } else {
            AccountStatus::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingLink {
    pub url: String,
    /// Unix seconds.
    pub expires_at: i64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn ping(&self) -> Result<(), GatewayError>;
    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError>;
    async fn create_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, GatewayError>;
    async fn retrieve_transfer(&self, transfer_id: &str) -> Result<GatewayTransfer, GatewayError>;
    async fn create_connected_account(
        &self,
        request: &ConnectedAccountRequest,
    ) -> Result<ConnectedAccount, GatewayError>;
    async fn retrieve_connected_account(
        &self,
        account_id: &str,
    ) -> Result<ConnectedAccount, GatewayError>;
    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<OnboardingLink, GatewayError>;
}
