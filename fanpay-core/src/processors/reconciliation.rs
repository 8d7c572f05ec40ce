//! Reconciliation auditor.

use crate::error::EngineError;
use crate::ledger::{ReconciliationReport, TransactionLedger};
use crate::oplog::{LogEvent, OperationLog};
use crate::processors::payout::{PayoutIntegrityReport, PayoutOrchestrator};
use std::sync::Arc;

pub struct ReconciliationAuditor {
    ledger: Arc<TransactionLedger>,
    payouts: Arc<PayoutOrchestrator>,
    log: Arc<OperationLog>,
}

impl ReconciliationAuditor {
    pub fn new(
        ledger: Arc<TransactionLedger>,
        payouts: Arc<PayoutOrchestrator>,
        log: Arc<OperationLog>,
    ) -> Self {
        Self {
            ledger,
            payouts,
            log,
        }
    }

    pub async fn reconciliation_report(&self) -> Result<ReconciliationReport, EngineError> {
        self.ledger.generate_reconciliation_report().await
    }

    pub async fn payout_integrity_report(&self) -> Result<PayoutIntegrityReport, EngineError> {
        self.payouts.validate_payout_integrity().await
    }

    /// Run the ledger report and raise one WARN per discrepancy.
    #[tracing::instrument(skip_all)]
    pub async fn weekly_check(&self) -> Result<ReconciliationReport, EngineError> {
        let report = self.reconciliation_report().await?;
        for discrepancy in &report.discrepancies {
            self.log.record(
                LogEvent::warn("reconciliation.discrepancy", discrepancy.reason.clone())
                    .transaction(discrepancy.transaction_id),
            );
        }
        self.log.record(
            LogEvent::info("reconciliation.weekly", "reconciliation check finished")
                .meta("transaction_count", report.transaction_count)
                .meta("total_collected", report.total_collected)
                .meta("creator_earnings", report.creator_earnings)
                .meta("platform_earnings", report.platform_earnings)
                .meta("discrepancies", report.discrepancies.len() as u64),
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use crate::oplog::LogFilter;
    use crate::test_support::{Harness, completed_transaction};
    use fanpay_sdk::objects::Severity;
    use uuid::Uuid;

    #[tokio::test]
    async fn weekly_check_warns_once_per_discrepancy() {
        let h = Harness::new();
        let creator = Uuid::new_v4();
        h.store
            .insert_unchecked(completed_transaction(creator, 100, 150, "pi_bad"))
            .await;
        h.store
            .insert_unchecked(completed_transaction(creator, 100, 20, "pi_ok"))
            .await;

        let report = h.engine.auditor().weekly_check().await.unwrap();
        assert_eq!(report.discrepancies.len(), 1);

        let warnings = h.engine.log().query(&LogFilter {
            severity: Some(Severity::Warn),
            operation: Some("reconciliation.discrepancy".to_string()),
            ..LogFilter::default()
        });
        assert_eq!(warnings.len(), 1);
    }
}
