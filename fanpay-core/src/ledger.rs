//! Append-only record of money events and the balances derived from it.

use crate::entities::{Transaction, TransactionStatus};
use crate::error::EngineError;
use crate::oplog::{LogEvent, OperationLog};
use crate::store::{ApplyOutcome, LedgerStore};
use fanpay_sdk::objects::{
    BalanceResponse, IntegrityCheckResponse, IntegrityDiscrepancy, ReconciliationReportResponse,
};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatorBalance {
    pub creator_id: Uuid,
    /// Creator earnings over completed transactions.
    pub payout_balance: i64,
    /// Pending, in-transit and paid payouts.
    pub committed: i64,
}

impl CreatorBalance {
    pub fn available(&self) -> i64 {
        self.payout_balance - self.committed
    }
}

impl From<CreatorBalance> for BalanceResponse {
    fn from(b: CreatorBalance) -> Self {
        Self {
            creator_id: b.creator_id,
            payout_balance: b.payout_balance,
            committed: b.committed,
            available: b.available(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityCheck {
    pub transaction_id: Uuid,
    pub fault: Option<String>,
}

impl IntegrityCheck {
    pub fn passed(&self) -> bool {
        self.fault.is_none()
    }
}

impl From<IntegrityCheck> for IntegrityCheckResponse {
    fn from(c: IntegrityCheck) -> Self {
        Self {
            transaction_id: c.transaction_id,
            passed: c.passed(),
            fault: c.fault,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub generated_at: OffsetDateTime,
    pub transaction_count: u64,
    pub total_collected: i64,
    pub creator_earnings: i64,
    pub platform_earnings: i64,
    pub discrepancies: Vec<IntegrityDiscrepancy>,
}

impl From<ReconciliationReport> for ReconciliationReportResponse {
    fn from(r: ReconciliationReport) -> Self {
        Self {
            generated_at: r.generated_at.unix_timestamp(),
            transaction_count: r.transaction_count,
            total_collected: r.total_collected,
            creator_earnings: r.creator_earnings,
            platform_earnings: r.platform_earnings,
            discrepancies: r.discrepancies,
        }
    }
}

pub struct TransactionLedger {
    store: Arc<dyn LedgerStore>,
    log: Arc<OperationLog>,
}

impl TransactionLedger {
    pub fn new(store: Arc<dyn LedgerStore>, log: Arc<OperationLog>) -> Self {
        Self { store, log }
    }

    /// Persist a verified money event after checking the fee invariant.
    ///
    /// The row insert and the beneficiary's counter credit happen in one
    /// store write keyed on the gateway intent, so recording the same intent
    /// twice yields [`ApplyOutcome::AlreadyApplied`] and credits nothing.
    pub async fn record(&self, transaction: Transaction) -> Result<ApplyOutcome, EngineError> {
        if let Some(fault) = transaction.integrity_fault() {
            self.log.record(
                LogEvent::error("ledger.record", format!("rejected transaction: {fault}"))
                    .transaction(transaction.id)
                    .payer(transaction.payer_id)
                    .creator(transaction.beneficiary_id),
            );
            return Err(EngineError::IntegrityViolation { reason: fault });
        }
        let outcome = self.store.apply_payment(&transaction).await?;
        if let ApplyOutcome::Applied(recorded) = &outcome {
            self.log.record(
                LogEvent::debug("ledger.record", "transaction recorded")
                    .transaction(recorded.id)
                    .payer(recorded.payer_id)
                    .creator(recorded.beneficiary_id)
                    .meta("amount", recorded.amount)
                    .meta("category", recorded.category.to_string()),
            );
        }
        Ok(outcome)
    }

    /// Sum of creator earnings over the creator's completed transactions.
    pub async fn get_payout_balance(&self, creator_id: Uuid) -> Result<i64, EngineError> {
        Ok(self.store.sum_creator_earnings(creator_id).await?)
    }

    pub async fn get_balance(&self, creator_id: Uuid) -> Result<CreatorBalance, EngineError> {
        let payout_balance = self.get_payout_balance(creator_id).await?;
        let committed = self.store.sum_committed_payouts(creator_id).await?;
        Ok(CreatorBalance {
            creator_id,
            payout_balance,
            committed,
        })
    }

    pub async fn validate_integrity(
        &self,
        transaction_id: Uuid,
    ) -> Result<IntegrityCheck, EngineError> {
        let transaction = self
            .store
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| EngineError::not_found("transaction", transaction_id))?;
        Ok(IntegrityCheck {
            transaction_id,
            fault: transaction.integrity_fault(),
        })
    }

    /// Totals over completed transactions, plus every row that fails the
    /// fee invariant regardless of status.
    pub async fn generate_reconciliation_report(
        &self,
    ) -> Result<ReconciliationReport, EngineError> {
        let transactions = self.store.list_transactions().await?;
        let mut report = ReconciliationReport {
            generated_at: OffsetDateTime::now_utc(),
            transaction_count: 0,
            total_collected: 0,
            creator_earnings: 0,
            platform_earnings: 0,
            discrepancies: Vec::new(),
        };
        for t in &transactions {
            if let Some(reason) = t.integrity_fault() {
                report.discrepancies.push(IntegrityDiscrepancy {
                    transaction_id: t.id,
                    reason,
                });
            }
            if t.status == TransactionStatus::Completed {
                report.transaction_count += 1;
                report.total_collected = accumulate(report.total_collected, t.amount)?;
                report.creator_earnings =
                    accumulate(report.creator_earnings, t.creator_earnings())?;
                report.platform_earnings = accumulate(report.platform_earnings, t.platform_fee)?;
            }
        }
        Ok(report)
    }

    #[tracing::instrument(skip(self))]
    pub async fn refund(&self, transaction_id: Uuid) -> Result<Transaction, EngineError> {
        let refunded = self.store.refund_transaction(transaction_id).await?;
        self.log.record(
            LogEvent::info("ledger.refund", "transaction refunded")
                .transaction(refunded.id)
                .payer(refunded.payer_id)
                .creator(refunded.beneficiary_id)
                .meta("amount", refunded.amount),
        );
        Ok(refunded)
    }
}

fn accumulate(total: i64, amount: i64) -> Result<i64, EngineError> {
    total
        .checked_add(amount)
        .ok_or_else(|| EngineError::IntegrityViolation {
            reason: format!("reconciliation total overflows adding {amount} to {total}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLedgerStore;
    use crate::test_support::completed_transaction;

    fn ledger() -> (Arc<InMemoryLedgerStore>, TransactionLedger) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let log = Arc::new(OperationLog::new(100, 100));
        (store.clone(), TransactionLedger::new(store, log))
    }

    #[tokio::test]
    async fn payout_balance_is_idempotent() {
        let (store, ledger) = ledger();
        let creator = Uuid::new_v4();
        store
            .apply_payment(&completed_transaction(creator, 10_000, 2_000, "pi_a"))
            .await
            .unwrap();
        store
            .apply_payment(&completed_transaction(creator, 500, 100, "pi_b"))
            .await
            .unwrap();

        let first = ledger.get_payout_balance(creator).await.unwrap();
        let second = ledger.get_payout_balance(creator).await.unwrap();
        assert_eq!(first, 8_400);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn record_rejects_fee_above_amount() {
        let (_, ledger) = ledger();
        let bad = completed_transaction(Uuid::new_v4(), 100, 101, "pi_bad");
        let err = ledger.record(bad).await.unwrap_err();
        assert!(matches!(err, EngineError::IntegrityViolation { .. }));
    }

    #[tokio::test]
    async fn report_lists_only_the_corrupted_row() {
        let (store, ledger) = ledger();
        let creator = Uuid::new_v4();
        for (i, amount) in [1_000, 2_000, 3_000].into_iter().enumerate() {
            store
                .apply_payment(&completed_transaction(
                    creator,
                    amount,
                    amount / 5,
                    &format!("pi_{i}"),
                ))
                .await
                .unwrap();
        }
        let corrupted = completed_transaction(creator, 100, 250, "pi_corrupt");
        store.insert_unchecked(corrupted.clone()).await;

        let report = ledger.generate_reconciliation_report().await.unwrap();
        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.discrepancies[0].transaction_id, corrupted.id);
        assert_eq!(report.transaction_count, 4);
        assert_eq!(report.total_collected, 6_100);

        let check = ledger.validate_integrity(corrupted.id).await.unwrap();
        assert!(!check.passed());
    }

    #[tokio::test]
    async fn available_balance_subtracts_committed_payouts() {
        let (store, ledger) = ledger();
        let creator = Uuid::new_v4();
        store
            .apply_payment(&completed_transaction(creator, 10_000, 2_000, "pi_c"))
            .await
            .unwrap();
        let payout = crate::entities::Payout::new_pending(Uuid::now_v7(), creator, 3_000, "usd");
        store.reserve_payout(&payout).await.unwrap();

        let balance = ledger.get_balance(creator).await.unwrap();
        assert_eq!(balance.payout_balance, 8_000);
        assert_eq!(balance.committed, 3_000);
        assert_eq!(balance.available(), 5_000);
    }

    #[tokio::test]
    async fn reconciliation_reports_overflowing_totals() {
        let (store, ledger) = ledger();
        let creator = Uuid::new_v4();
        store
            .insert_unchecked(completed_transaction(creator, i64::MAX, 0, "pi_big_1"))
            .await;
        store
            .insert_unchecked(completed_transaction(creator, 1, 0, "pi_big_2"))
            .await;
        let err = ledger.generate_reconciliation_report().await.unwrap_err();
        assert!(matches!(err, EngineError::IntegrityViolation { .. }));
    }

    #[tokio::test]
    async fn recording_a_seen_intent_is_a_replay() {
        let (store, ledger) = ledger();
        let creator = Uuid::new_v4();
        let first = completed_transaction(creator, 2_000, 400, "pi_seen");
        let mut again = first.clone();
        again.id = Uuid::now_v7();

        assert!(matches!(
            ledger.record(first.clone()).await.unwrap(),
            ApplyOutcome::Applied(_)
        ));
        assert!(matches!(
            ledger.record(again).await.unwrap(),
            ApplyOutcome::AlreadyApplied(_)
        ));
        assert_eq!(store.sum_creator_earnings(creator).await.unwrap(), 1_600);
    }

    #[tokio::test]
    async fn validate_unknown_transaction_is_not_found() {
        let (_, ledger) = ledger();
        let err = ledger.validate_integrity(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
