use super::{ApplyOutcome, LedgerStore, ReserveOutcome, StoreError};
use crate::entities::{AccountStatus, CreatorAccount, Payout, Transaction};
use crate::fees::FeeTier;
use crate::utils::timeout::time_boxed;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Applies a per-call deadline to every call on the inner store. An elapsed
/// deadline surfaces as [`StoreError::Timeout`], which the engine treats as
/// transient.
pub struct TimedLedgerStore {
    inner: Arc<dyn LedgerStore>,
    limit: Duration,
}

impl TimedLedgerStore {
    pub fn new(inner: Arc<dyn LedgerStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl LedgerStore for TimedLedgerStore {
    async fn ping(&self) -> Result<(), StoreError> {
        time_boxed(self.limit, self.inner.ping()).await
    }

    async fn apply_payment(&self, transaction: &Transaction) -> Result<ApplyOutcome, StoreError> {
        time_boxed(self.limit, self.inner.apply_payment(transaction)).await
    }

    async fn refund_transaction(&self, id: Uuid) -> Result<Transaction, StoreError> {
        time_boxed(self.limit, self.inner.refund_transaction(id)).await
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, StoreError> {
        time_boxed(self.limit, self.inner.get_transaction(id)).await
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        time_boxed(self.limit, self.inner.list_transactions()).await
    }

    async fn sum_creator_earnings(&self, creator_id: Uuid) -> Result<i64, StoreError> {
        time_boxed(self.limit, self.inner.sum_creator_earnings(creator_id)).await
    }

    async fn sum_creator_gross_since(
        &self,
        creator_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        time_boxed(
            self.limit,
            self.inner.sum_creator_gross_since(creator_id, since),
        )
        .await
    }

    async fn get_creator(&self, creator_id: Uuid) -> Result<Option<CreatorAccount>, StoreError> {
        time_boxed(self.limit, self.inner.get_creator(creator_id)).await
    }

    async fn list_creators(&self) -> Result<Vec<CreatorAccount>, StoreError> {
        time_boxed(self.limit, self.inner.list_creators()).await
    }

    async fn upsert_connected_account(
        &self,
        creator_id: Uuid,
        connected_account_id: &str,
        status: AccountStatus,
    ) -> Result<CreatorAccount, StoreError> {
        time_boxed(
            self.limit,
            self.inner
                .upsert_connected_account(creator_id, connected_account_id, status),
        )
        .await
    }

    async fn set_elite_founding(&self, creator_id: Uuid) -> Result<CreatorAccount, StoreError> {
        time_boxed(self.limit, self.inner.set_elite_founding(creator_id)).await
    }

    async fn set_assigned_tier(
        &self,
        creator_id: Uuid,
        tier: FeeTier,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        time_boxed(self.limit, self.inner.set_assigned_tier(creator_id, tier, at)).await
    }

    async fn reserve_payout(&self, payout: &Payout) -> Result<ReserveOutcome, StoreError> {
        time_boxed(self.limit, self.inner.reserve_payout(payout)).await
    }

    async fn update_payout(&self, payout: &Payout) -> Result<(), StoreError> {
        time_boxed(self.limit, self.inner.update_payout(payout)).await
    }

    async fn get_payout(&self, id: Uuid) -> Result<Option<Payout>, StoreError> {
        time_boxed(self.limit, self.inner.get_payout(id)).await
    }

    async fn list_payouts(&self, creator_id: Option<Uuid>) -> Result<Vec<Payout>, StoreError> {
        time_boxed(self.limit, self.inner.list_payouts(creator_id)).await
    }

    async fn sum_committed_payouts(&self, creator_id: Uuid) -> Result<i64, StoreError> {
        time_boxed(self.limit, self.inner.sum_committed_payouts(creator_id)).await
    }
}
