use super::{ApplyOutcome, LedgerStore, ReserveOutcome, StoreError};
use crate::entities::{
    AccountStatus, Category, CreatorAccount, Payout, Transaction, TransactionStatus,
};
use crate::fees::FeeTier;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    transactions: Vec<Transaction>,
    creators: HashMap<Uuid, CreatorAccount>,
    payouts: Vec<Payout>,
}

impl MemoryState {
    fn transaction(&self, id: Uuid) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    fn by_intent(&self, intent: &str) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|t| t.gateway_intent_id.as_deref() == Some(intent))
    }

    fn check_insert(&self, t: &Transaction) -> Result<(), StoreError> {
        if let Some(fault) = t.integrity_fault() {
            return Err(StoreError::Invalid(fault));
        }
        if self.transaction(t.id).is_some() {
            return Err(StoreError::Conflict(format!("transaction {}", t.id)));
        }
        if let Some(intent) = &t.gateway_intent_id
            && self.by_intent(intent).is_some()
        {
            return Err(StoreError::Conflict(format!("gateway intent {intent}")));
        }
        Ok(())
    }

    fn earnings(&self, creator_id: Uuid) -> i64 {
        self.transactions
            .iter()
            .filter(|t| counts_as_earnings(t, creator_id))
            .map(Transaction::creator_earnings)
            .sum()
    }

    fn committed(&self, creator_id: Uuid) -> i64 {
        self.payouts
            .iter()
            .filter(|p| p.creator_id == creator_id && p.status.is_committed())
            .map(|p| p.amount)
            .sum()
    }

    fn creator_mut(&mut self, creator_id: Uuid) -> &mut CreatorAccount {
        self.creators
            .entry(creator_id)
            .or_insert_with(|| CreatorAccount::new(creator_id))
    }
}

fn counts_as_earnings(t: &Transaction, creator_id: Uuid) -> bool {
    t.beneficiary_id == Some(creator_id)
        && t.status == TransactionStatus::Completed
        && t.category != Category::Payout
}

/// Process-local [`LedgerStore`] with the same constraints as the Postgres
/// schema. Supports injected outages for exercising failover paths.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<MemoryState>,
    unavailable: AtomicBool,
    failing_writes: AtomicU32,
    lost_acks: AtomicU32,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `count` write calls.
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Apply the next `count` writes but report them as failed, like a
    /// commit whose response never reached the caller.
    pub fn lose_next_acks(&self, count: u32) {
        self.lost_acks.store(count, Ordering::SeqCst);
    }

    /// Insert a row without constraint checks, for seeding fixtures.
    pub async fn insert_unchecked(&self, transaction: Transaction) {
        self.state.write().await.transactions.push(transaction);
    }

    pub async fn insert_creator(&self, account: CreatorAccount) {
        self.state
            .write()
            .await
            .creators
            .insert(account.creator_id, account);
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        self.check_read()?;
        let failed = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failed.is_ok() {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    fn acknowledge<T>(&self, value: T) -> Result<T, StoreError> {
        let lost = self
            .lost_acks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if lost.is_ok() {
            return Err(StoreError::Unavailable(
                "write applied but acknowledgement lost".to_string(),
            ));
        }
        Ok(value)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_read()
    }

    async fn apply_payment(&self, transaction: &Transaction) -> Result<ApplyOutcome, StoreError> {
        self.check_write()?;
        let mut state = self.state.write().await;
        if let Some(intent) = &transaction.gateway_intent_id
            && let Some(existing) = state.by_intent(intent)
        {
            return Ok(ApplyOutcome::AlreadyApplied(existing.clone()));
        }
        state.check_insert(transaction)?;
        state.transactions.push(transaction.clone());
        if let Some(creator_id) = transaction.beneficiary_id {
            state.creator_mut(creator_id).total_earnings += transaction.creator_earnings();
        }
        self.acknowledge(ApplyOutcome::Applied(transaction.clone()))
    }

    async fn refund_transaction(&self, id: Uuid) -> Result<Transaction, StoreError> {
        self.check_write()?;
        let mut state = self.state.write().await;
        let transaction = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "transaction",
                id: id.to_string(),
            })?;
        if transaction.status != TransactionStatus::Completed {
            return Err(StoreError::Conflict(format!(
                "transaction {id} is not completed"
            )));
        }
        transaction.status = TransactionStatus::Refunded;
        let refunded = transaction.clone();
        if let Some(creator_id) = refunded.beneficiary_id {
            state.creator_mut(creator_id).total_earnings -= refunded.creator_earnings();
        }
        self.acknowledge(refunded)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, StoreError> {
        self.check_read()?;
        Ok(self.state.read().await.transaction(id).cloned())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        self.check_read()?;
        Ok(self.state.read().await.transactions.clone())
    }

    async fn sum_creator_earnings(&self, creator_id: Uuid) -> Result<i64, StoreError> {
        self.check_read()?;
        Ok(self.state.read().await.earnings(creator_id))
    }

    async fn sum_creator_gross_since(
        &self,
        creator_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        self.check_read()?;
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .filter(|t| counts_as_earnings(t, creator_id) && t.created_at >= since)
            .map(|t| t.amount)
            .sum())
    }

    async fn get_creator(&self, creator_id: Uuid) -> Result<Option<CreatorAccount>, StoreError> {
        self.check_read()?;
        Ok(self.state.read().await.creators.get(&creator_id).cloned())
    }

    async fn list_creators(&self) -> Result<Vec<CreatorAccount>, StoreError> {
        self.check_read()?;
        let mut creators: Vec<_> = self.state.read().await.creators.values().cloned().collect();
        creators.sort_by_key(|c| c.creator_id);
        Ok(creators)
    }

    async fn upsert_connected_account(
        &self,
        creator_id: Uuid,
        connected_account_id: &str,
        status: AccountStatus,
    ) -> Result<CreatorAccount, StoreError> {
        self.check_write()?;
        let mut state = self.state.write().await;
        let account = state.creator_mut(creator_id);
        account.connected_account_id = Some(connected_account_id.to_string());
        account.account_status = status;
        Ok(account.clone())
    }

    async fn set_elite_founding(&self, creator_id: Uuid) -> Result<CreatorAccount, StoreError> {
        self.check_write()?;
        let mut state = self.state.write().await;
        let account = state.creator_mut(creator_id);
        account.elite_founding = true;
        Ok(account.clone())
    }

    async fn set_assigned_tier(
        &self,
        creator_id: Uuid,
        tier: FeeTier,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        let mut state = self.state.write().await;
        let account = state
            .creators
            .get_mut(&creator_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "creator account",
                id: creator_id.to_string(),
            })?;
        account.assigned_tier = Some(tier);
        account.tier_updated_at = Some(at);
        Ok(())
    }

    async fn reserve_payout(&self, payout: &Payout) -> Result<ReserveOutcome, StoreError> {
        self.check_write()?;
        let mut state = self.state.write().await;
        if !state.creators.contains_key(&payout.creator_id) {
            return Err(StoreError::NotFound {
                entity: "creator account",
                id: payout.creator_id.to_string(),
            });
        }
        if let Some(existing) = state.payouts.iter().find(|p| p.id == payout.id) {
            return Ok(ReserveOutcome::AlreadyReserved(existing.clone()));
        }
        let available = state.earnings(payout.creator_id) - state.committed(payout.creator_id);
        if available < payout.amount {
            return Ok(ReserveOutcome::Insufficient { available });
        }
        state.payouts.push(payout.clone());
        self.acknowledge(ReserveOutcome::Reserved(payout.clone()))
    }

    async fn update_payout(&self, payout: &Payout) -> Result<(), StoreError> {
        self.check_write()?;
        let mut state = self.state.write().await;
        let stored = state
            .payouts
            .iter_mut()
            .find(|p| p.id == payout.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "payout",
                id: payout.id.to_string(),
            })?;
        stored.gateway_transfer_id = payout.gateway_transfer_id.clone();
        stored.status = payout.status;
        stored.arrival_date = payout.arrival_date;
        stored.failure_code = payout.failure_code.clone();
        stored.failure_message = payout.failure_message.clone();
        self.acknowledge(())
    }

    async fn get_payout(&self, id: Uuid) -> Result<Option<Payout>, StoreError> {
        self.check_read()?;
        Ok(self
            .state
            .read()
            .await
            .payouts
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn list_payouts(&self, creator_id: Option<Uuid>) -> Result<Vec<Payout>, StoreError> {
        self.check_read()?;
        let state = self.state.read().await;
        let mut payouts: Vec<_> = state
            .payouts
            .iter()
            .rev()
            .filter(|p| creator_id.is_none_or(|id| p.creator_id == id))
            .cloned()
            .collect();
        payouts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payouts)
    }

    async fn sum_committed_payouts(&self, creator_id: Uuid) -> Result<i64, StoreError> {
        self.check_read()?;
        Ok(self.state.read().await.committed(creator_id))
    }
}
