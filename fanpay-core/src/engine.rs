//! Composition root.
//!
//! [`Engine`] wires the processors around one store and one gateway, both
//! wrapped with the configured call time boxes. It is also the failover
//! retry dispatcher and the runner behind every scheduled task.

use crate::access::{Principal, Role, requires_role};
use crate::config::{ConfigError, EngineConfig, LiveSchedule, MAX_RETRIES};
use crate::error::EngineError;
use crate::gateway::{PaymentGateway, TimedPaymentGateway};
use crate::ledger::TransactionLedger;
use crate::oplog::{LogEvent, OperationLog};
use crate::operator::OperatorConsole;
use crate::processors::failover::{FailoverOperation, FailoverQueue, FailoverRecord, RetryHandler};
use crate::processors::{
    AccountRegistry, PaymentProcessor, PayoutOrchestrator, ReconciliationAuditor, TaskRunner,
    TaskScheduler, TierRecalculator,
};
use crate::store::{LedgerStore, TimedLedgerStore};
use async_trait::async_trait;
use fanpay_sdk::objects::{ScheduledTask, TaskRunResponse};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    log: Arc<OperationLog>,
    failover: Arc<FailoverQueue>,
    ledger: Arc<TransactionLedger>,
    payments: PaymentProcessor,
    payouts: Arc<PayoutOrchestrator>,
    accounts: AccountRegistry,
    tiers: TierRecalculator,
    auditor: ReconciliationAuditor,
    scheduler: Arc<TaskScheduler>,
    schedule: LiveSchedule,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let store: Arc<dyn LedgerStore> =
            Arc::new(TimedLedgerStore::new(store, config.timeouts.store()));
        let gateway: Arc<dyn PaymentGateway> =
            Arc::new(TimedPaymentGateway::new(gateway, config.timeouts.gateway()));
        let log = Arc::new(OperationLog::new(config.log.capacity, config.log.query_cap));
        let failover = Arc::new(FailoverQueue::new(
            config.failover.capacity,
            MAX_RETRIES,
            log.clone(),
        ));
        let ledger = Arc::new(TransactionLedger::new(store.clone(), log.clone()));
        let payments = PaymentProcessor::new(
            ledger.clone(),
            gateway.clone(),
            config.fees.clone(),
            config.currency.clone(),
            failover.clone(),
            log.clone(),
        );
        let payouts = Arc::new(PayoutOrchestrator::new(
            store.clone(),
            gateway.clone(),
            ledger.clone(),
            config.currency.clone(),
            config.timeouts.batch_step(),
            failover.clone(),
            log.clone(),
        ));
        let accounts = AccountRegistry::new(store.clone(), gateway.clone(), log.clone());
        let tiers = TierRecalculator::new(
            store.clone(),
            config.tiers.clone(),
            failover.clone(),
            log.clone(),
        );
        let auditor = ReconciliationAuditor::new(ledger.clone(), payouts.clone(), log.clone());
        let scheduler = Arc::new(TaskScheduler::new(log.clone()));
        let schedule = LiveSchedule::new(config.schedule.clone());

        Ok(Self {
            config,
            store,
            gateway,
            log,
            failover,
            ledger,
            payments,
            payouts,
            accounts,
            tiers,
            auditor,
            scheduler,
            schedule,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn payments(&self) -> &PaymentProcessor {
        &self.payments
    }

    pub fn payouts(&self) -> &Arc<PayoutOrchestrator> {
        &self.payouts
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    pub fn tiers(&self) -> &TierRecalculator {
        &self.tiers
    }

    pub fn auditor(&self) -> &ReconciliationAuditor {
        &self.auditor
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn failover(&self) -> &FailoverQueue {
        &self.failover
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// Live scheduler intervals. Updating it re-times the tick loops.
    pub fn schedule(&self) -> &LiveSchedule {
        &self.schedule
    }

    /// Ping the store and the gateway within their time boxes.
    pub async fn validate_collaborators(&self) -> Result<(), EngineError> {
        self.store.ping().await?;
        self.gateway.ping().await?;
        info!("Ledger store and payment gateway reachable");
        Ok(())
    }

    /// Operator surface, after the admin capability check.
    pub fn operator<'a>(
        &'a self,
        principal: &'a Principal,
    ) -> Result<OperatorConsole<'a>, EngineError> {
        requires_role(principal, Role::Admin)?;
        Ok(OperatorConsole::new(self, principal))
    }

    pub async fn trigger_task(&self, task: ScheduledTask) -> TaskRunResponse {
        self.scheduler.trigger(task, self).await
    }

    /// Start the scheduler tick loops. They stop when `shutdown_rx` flips.
    pub fn spawn_scheduler(self: &Arc<Self>, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let runner: Arc<dyn TaskRunner> = self.clone();
        let scheduler = Arc::clone(&self.scheduler);
        tokio::spawn(scheduler.run(runner, self.schedule.subscribe(), shutdown_rx))
    }
}

#[async_trait]
impl RetryHandler for Engine {
    async fn retry(&self, record: &FailoverRecord) -> Result<(), EngineError> {
        match record.operation()? {
            FailoverOperation::Payment { command } => self.payments.replay(&command).await,
            FailoverOperation::PayoutRequest {
                payout_id,
                creator_id,
                amount,
            } => {
                self.payouts
                    .replay_request(payout_id, creator_id, amount)
                    .await
            }
            FailoverOperation::PayoutTransfer { payout_id, .. } => {
                self.payouts.replay_transfer(payout_id).await
            }
            FailoverOperation::PayoutPersist { payout } => {
                self.payouts.replay_persist(&payout).await
            }
            FailoverOperation::TierRecalculation { creator_id } => {
                self.tiers.recalculate_creator(creator_id).await.map(|_| ())
            }
        }
    }
}

#[async_trait]
impl TaskRunner for Engine {
    async fn run_task(&self, task: ScheduledTask) -> Result<String, EngineError> {
        match task {
            ScheduledTask::MonthlyTierRecalculation => {
                Ok(self.tiers.recalculate_all().await?.to_string())
            }
            ScheduledTask::DailyBatchPayouts => {
                let result = self
                    .payouts
                    .process_batch_payouts(self.config.batch_min_amount)
                    .await?;
                Ok(format!(
                    "paid {} creators ({} total), {} failed",
                    result.successful, result.total_amount, result.failed
                ))
            }
            ScheduledTask::WeeklyReconciliation => {
                let report = self.auditor.weekly_check().await?;
                Ok(format!(
                    "{} transactions, {} discrepancies",
                    report.transaction_count,
                    report.discrepancies.len()
                ))
            }
            ScheduledTask::FailoverSweep => {
                let mut summary = self.failover.process_queue(self).await;
                summary.collected = self.failover.clear_resolved(self.config.failover.retention());
                if summary.attempted > 0 || summary.collected > 0 {
                    self.log.record(
                        LogEvent::info("failover.sweep", summary.to_string())
                            .meta("attempted", summary.attempted)
                            .meta("succeeded", summary.succeeded)
                            .meta("exhausted", summary.exhausted),
                    );
                }
                Ok(summary.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Category;
    use crate::gateway::IntentStatus;
    use crate::store::InMemoryLedgerStore;
    use crate::test_support::{Harness, StubGateway, payment_command};
    use fanpay_sdk::objects::{BackupStatus, TaskOutcome};
    use uuid::Uuid;

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = EngineConfig::default();
        config.failover.capacity = 0;
        let result = Engine::new(
            config,
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(StubGateway::default()),
        );
        assert!(matches!(result, Err(ConfigError::Zero { .. })));
    }

    #[tokio::test]
    async fn collaborator_validation_surfaces_outages() {
        let h = Harness::new();
        h.engine.validate_collaborators().await.unwrap();

        h.store.set_unavailable(true);
        let err = h.engine.validate_collaborators().await.unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable { .. }));
        h.store.set_unavailable(false);

        h.gateway.set_unavailable(true);
        let err = h.engine.validate_collaborators().await.unwrap_err();
        assert!(matches!(err, EngineError::GatewayUnavailable { .. }));
    }

    #[tokio::test]
    async fn failover_sweep_task_replays_deferred_payment() {
        let h = Harness::new();
        let creator = Uuid::new_v4();
        h.gateway.add_intent("pi_sweep", 1_000, IntentStatus::Succeeded);
        h.gateway.set_unavailable(true);
        h.engine
            .payments()
            .process_payment(payment_command(creator, 1_000, Category::Tip, "pi_sweep"))
            .await
            .unwrap_err();
        h.gateway.set_unavailable(false);

        let response = h.engine.trigger_task(ScheduledTask::FailoverSweep).await;
        assert_eq!(response.outcome, TaskOutcome::Completed);
        let record = &h.engine.failover().records_for_creator(creator)[0];
        assert_eq!(record.backup_status, BackupStatus::Success);
        assert_eq!(h.engine.ledger().get_payout_balance(creator).await.unwrap(), 800);
    }

    #[tokio::test]
    async fn operator_console_requires_admin() {
        let h = Harness::new();
        let service = Principal::service("backend");
        assert!(matches!(
            h.engine.operator(&service),
            Err(EngineError::Forbidden)
        ));
        let admin = Principal::admin("ops");
        assert!(h.engine.operator(&admin).is_ok());
    }
}
