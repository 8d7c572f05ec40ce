//! Operator console.
//!
//! Obtained through [`Engine::operator`], which performs the admin check.
//! Mutating actions are recorded in the operation log with the operator's
//! subject.

use crate::access::Principal;
use crate::engine::Engine;
use crate::entities::CreatorAccount;
use crate::error::EngineError;
use crate::ledger::{IntegrityCheck, ReconciliationReport};
use crate::oplog::{LogEntry, LogEvent, LogFilter, LogSummary};
use crate::processors::failover::FailoverRecord;
use crate::processors::payout::PayoutIntegrityReport;
use crate::processors::tiers::FeeProfile;
use fanpay_sdk::objects::{FailoverQueueStatus, ScheduledTask, TaskRunResponse};
use uuid::Uuid;

pub struct OperatorConsole<'a> {
    engine: &'a Engine,
    principal: &'a Principal,
}

impl<'a> OperatorConsole<'a> {
    pub(crate) fn new(engine: &'a Engine, principal: &'a Principal) -> Self {
        Self { engine, principal }
    }

    fn audit(&self, operation: &'static str, message: &str) -> LogEvent {
        LogEvent::info(operation, message).meta("operator", self.principal.subject.clone())
    }

    pub fn failover_status(&self) -> FailoverQueueStatus {
        self.engine.failover().status()
    }

    pub fn creator_failover_records(&self, creator_id: Uuid) -> Vec<FailoverRecord> {
        self.engine.failover().records_for_creator(creator_id)
    }

    pub async fn retry_failover(&self, id: Uuid) -> Result<FailoverRecord, EngineError> {
        self.engine
            .log()
            .record(self.audit("operator.retry_failover", "manual failover retry").failover(id));
        self.engine.failover().retry_record(id, self.engine).await
    }

    pub fn logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.engine.log().query(filter)
    }

    pub fn log_summary(&self) -> LogSummary {
        self.engine.log().summary()
    }

    pub async fn trigger_task(&self, task: ScheduledTask) -> TaskRunResponse {
        self.engine.log().record(
            self.audit("operator.trigger_task", "manual task trigger")
                .meta("task", task.as_str()),
        );
        self.engine.trigger_task(task).await
    }

    pub async fn reconciliation_report(&self) -> Result<ReconciliationReport, EngineError> {
        self.engine.auditor().reconciliation_report().await
    }

    /// Re-check the fee invariant of one stored transaction.
    pub async fn transaction_integrity(
        &self,
        transaction_id: Uuid,
    ) -> Result<IntegrityCheck, EngineError> {
        let check = self.engine.ledger().validate_integrity(transaction_id).await?;
        if let Some(fault) = &check.fault {
            self.engine.log().record(
                LogEvent::error("operator.integrity", format!("integrity check failed: {fault}"))
                    .transaction(transaction_id)
                    .meta("operator", self.principal.subject.clone()),
            );
        }
        Ok(check)
    }

    pub async fn payout_integrity_report(&self) -> Result<PayoutIntegrityReport, EngineError> {
        self.engine.auditor().payout_integrity_report().await
    }

    pub async fn grant_elite_founding(
        &self,
        creator_id: Uuid,
    ) -> Result<CreatorAccount, EngineError> {
        self.engine.log().record(
            self.audit("operator.elite_founding", "elite founding grant requested")
                .creator(creator_id),
        );
        self.engine.accounts().grant_elite_founding(creator_id).await
    }

    pub async fn fee_profile(&self, creator_id: Uuid) -> Result<FeeProfile, EngineError> {
        self.engine.tiers().fee_profile(creator_id).await
    }
}
