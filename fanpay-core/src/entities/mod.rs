pub mod creators;
pub mod payouts;
pub mod transactions;

pub use creators::CreatorAccount;
pub use payouts::Payout;
pub use transactions::Transaction;

use fanpay_sdk::objects::{
    AccountStatus as SdkAccountStatus, Category as SdkCategory, PayoutStatus as SdkPayoutStatus,
    TransactionStatus as SdkTransactionStatus,
};
use serde::{Deserialize, Serialize};

/// Money-event category for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `fanpay_sdk::objects::Category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case", type_name = "transaction_category")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Subscription,
    PayPerView,
    Tip,
    Payout,
    Merchandise,
    EphemeralContent,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Subscription => "subscription",
            Category::PayPerView => "pay_per_view",
            Category::Tip => "tip",
            Category::Payout => "payout",
            Category::Merchandise => "merchandise",
            Category::EphemeralContent => "ephemeral_content",
        };
        f.write_str(name)
    }
}

impl From<Category> for SdkCategory {
    fn from(value: Category) -> Self {
        match value {
            Category::Subscription => SdkCategory::Subscription,
            Category::PayPerView => SdkCategory::PayPerView,
            Category::Tip => SdkCategory::Tip,
            Category::Payout => SdkCategory::Payout,
            Category::Merchandise => SdkCategory::Merchandise,
            Category::EphemeralContent => SdkCategory::EphemeralContent,
        }
    }
}

impl From<SdkCategory> for Category {
    fn from(value: SdkCategory) -> Self {
        match value {
            SdkCategory::Subscription => Category::Subscription,
            SdkCategory::PayPerView => Category::PayPerView,
            SdkCategory::Tip => Category::Tip,
            SdkCategory::Payout => Category::Payout,
            SdkCategory::Merchandise => Category::Merchandise,
            SdkCategory::EphemeralContent => Category::EphemeralContent,
        }
    }
}

/// Transaction status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case", type_name = "transaction_status")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl From<TransactionStatus> for SdkTransactionStatus {
    fn from(value: TransactionStatus) -> Self {
        match value {
            TransactionStatus::Pending => SdkTransactionStatus::Pending,
            TransactionStatus::Completed => SdkTransactionStatus::Completed,
            TransactionStatus::Failed => SdkTransactionStatus::Failed,
            TransactionStatus::Refunded => SdkTransactionStatus::Refunded,
        }
    }
}

/// Payout status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case", type_name = "payout_status")]
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

    /// Counts against the creator's available balance.
    pub fn is_committed(&self) -> bool {
        matches!(
            self,
            PayoutStatus::Pending | PayoutStatus::InTransit | PayoutStatus::Paid
        )
    }
}

impl From<PayoutStatus> for SdkPayoutStatus {
    fn from(value: PayoutStatus) -> Self {
        match value {
            PayoutStatus::Pending => SdkPayoutStatus::Pending,
            PayoutStatus::InTransit => SdkPayoutStatus::InTransit,
            PayoutStatus::Paid => SdkPayoutStatus::Paid,
            PayoutStatus::Failed => SdkPayoutStatus::Failed,
            PayoutStatus::Cancelled => SdkPayoutStatus::Cancelled,
        }
    }
}

/// Connected payout account status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase", type_name = "account_status")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Active,
    Inactive,
}

impl From<AccountStatus> for SdkAccountStatus {
    fn from(value: AccountStatus) -> Self {
        match value {
            AccountStatus::Pending => SdkAccountStatus::Pending,
            AccountStatus::Active => SdkAccountStatus::Active,
            AccountStatus::Inactive => SdkAccountStatus::Inactive,
        }
    }
}

/// Unix seconds, as used across the API objects.
pub(crate) fn unix(ts: time::OffsetDateTime) -> i64 {
    ts.unix_timestamp()
}
