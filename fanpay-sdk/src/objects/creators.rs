//! Creator account and fee-profile objects.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signature::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Active,
    Inactive,
}

/// Service API body for `POST /creators/onboard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardCreatorRequest {
    pub creator_id: Uuid,
    pub email: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

impl Signature for OnboardCreatorRequest {}

/// Service API body for `POST /creators/onboarding-link`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingLinkRequest {
    pub creator_id: Uuid,
    pub refresh_url: String,
    pub return_url: String,
}

impl Signature for OnboardingLinkRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedAccountResponse {
    pub creator_id: Uuid,
    pub account_id: Option<String>,
    pub status: AccountStatus,
    pub elite_founding: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingLinkResponse {
    pub url: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierResponse {
    pub threshold: i64,
    pub platform_percent: u8,
    pub creator_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeProfileResponse {
    pub creator_id: Uuid,
    pub elite_founding: bool,
    pub trailing_month_earnings: i64,
    pub effective_tier: TierResponse,
    /// Tier stored by the last monthly recalculation, if any.
    pub assigned_tier: Option<TierResponse>,
}
