//! Persistence seam for ledger rows, creator accounts and payouts.

pub mod memory;
pub mod postgres;
pub mod timed;

pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use timed::TimedLedgerStore;

use crate::entities::{AccountStatus, CreatorAccount, Payout, Transaction};
use crate::fees::FeeTier;
use crate::utils::timeout::TimeoutError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("rejected row: {0}")]
    Invalid(String),
}

impl TimeoutError for StoreError {
    fn timed_out(limit: Duration) -> Self {
        StoreError::Timeout(limit)
    }
}

/// Result of applying a verified payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The row was inserted and the beneficiary's counter credited.
    Applied(Transaction),
    /// A row for the same gateway intent already existed; nothing changed.
    AlreadyApplied(Transaction),
}

/// Result of reserving a payout against a creator's balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// The pending row was written; its amount is now committed.
    Reserved(Payout),
    /// A payout with this id was already written; nothing changed.
    AlreadyReserved(Payout),
    Insufficient { available: i64 },
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    /// Insert the transaction and credit the beneficiary's earnings counter
    /// atomically, deduplicating on the gateway intent id.
    async fn apply_payment(&self, transaction: &Transaction) -> Result<ApplyOutcome, StoreError>;
    /// Move a completed transaction to refunded and debit the counter atomically.
    async fn refund_transaction(&self, id: Uuid) -> Result<Transaction, StoreError>;
    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, StoreError>;
    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError>;
    async fn sum_creator_earnings(&self, creator_id: Uuid) -> Result<i64, StoreError>;
    async fn sum_creator_gross_since(
        &self,
        creator_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, StoreError>;

    async fn get_creator(&self, creator_id: Uuid) -> Result<Option<CreatorAccount>, StoreError>;
    async fn list_creators(&self) -> Result<Vec<CreatorAccount>, StoreError>;
    async fn upsert_connected_account(
        &self,
        creator_id: Uuid,
        connected_account_id: &str,
        status: AccountStatus,
    ) -> Result<CreatorAccount, StoreError>;
    async fn set_elite_founding(&self, creator_id: Uuid) -> Result<CreatorAccount, StoreError>;
    async fn set_assigned_tier(
        &self,
        creator_id: Uuid,
        tier: FeeTier,
        at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Write a pending payout if the creator's earnings minus committed
    /// payouts cover it. The check and the write are one atomic unit, and a
    /// payout id that already exists is returned unchanged.
    async fn reserve_payout(&self, payout: &Payout) -> Result<ReserveOutcome, StoreError>;
    async fn update_payout(&self, payout: &Payout) -> Result<(), StoreError>;
    async fn get_payout(&self, id: Uuid) -> Result<Option<Payout>, StoreError>;
    /// Newest first.
    async fn list_payouts(&self, creator_id: Option<Uuid>) -> Result<Vec<Payout>, StoreError>;
    async fn sum_committed_payouts(&self, creator_id: Uuid) -> Result<i64, StoreError>;
}
