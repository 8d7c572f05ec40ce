//! Failover redundancy queue.
//!
//! Operations whose primary path failed on infrastructure are captured here
//! with an opaque payload and retried by the sweep task or by an operator.
//!
//! State machine per record:
//!
//! ```text
//! pending --retry ok--> success --retention elapsed--> (collected)
//! pending --retry failed, count < max--> pending
//! pending --retry failed, count >= max or non-transient--> exhausted
//! exhausted --manual retry ok--> success
//! ```
//!
//! Exhausted records are never collected. A record being retried is marked
//! in flight, so the sweep and a manual retry can never run it concurrently.

use crate::entities::Payout;
use crate::error::EngineError;
use crate::oplog::{LogEvent, OperationLog};
use crate::processors::payment::PaymentCommand;
use async_trait::async_trait;
use fanpay_sdk::objects::{BackupStatus, FailoverQueueStatus, FailoverRecordResponse, OperationKind};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use time::OffsetDateTime;
use uuid::Uuid;

/// A captured operation, serialized into the record payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum FailoverOperation {
    /// Re-verify and apply a payment.
    Payment { command: PaymentCommand },
    /// The payout row may not have been written; nothing reached the gateway.
    /// Replays reuse `payout_id`, so a row that did commit is resumed.
    PayoutRequest {
        payout_id: Uuid,
        creator_id: Uuid,
        amount: i64,
    },
    /// The payout row exists but the gateway transfer is outstanding.
    PayoutTransfer { payout_id: Uuid, creator_id: Uuid },
    /// The gateway accepted the transfer but the row update was lost.
    PayoutPersist { payout: Payout },
    TierRecalculation { creator_id: Uuid },
}

impl FailoverOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            FailoverOperation::Payment { .. } => OperationKind::Payment,
            FailoverOperation::PayoutRequest { .. }
            | FailoverOperation::PayoutTransfer { .. }
            | FailoverOperation::PayoutPersist { .. } => OperationKind::Payout,
            FailoverOperation::TierRecalculation { .. } => OperationKind::TierRecalculation,
        }
    }

    pub fn creator_id(&self) -> Option<Uuid> {
        match self {
            FailoverOperation::Payment { command } => command.beneficiary_id,
            FailoverOperation::PayoutRequest { creator_id, .. }
            | FailoverOperation::PayoutTransfer { creator_id, .. }
            | FailoverOperation::TierRecalculation { creator_id } => Some(*creator_id),
            FailoverOperation::PayoutPersist { payout } => Some(payout.creator_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailoverRecord {
    pub id: Uuid,
    pub operation_kind: OperationKind,
    pub creator_id: Option<Uuid>,
    pub cause: String,
    pub payload: serde_json::Value,
    pub retry_count: u32,
    pub max_retries: u32,
    pub backup_status: BackupStatus,
    pub last_error: Option<String>,
    pub created_at: OffsetDateTime,
    pub resolved_at: Option<OffsetDateTime>,
    in_flight: bool,
}

impl FailoverRecord {
    pub fn operation(&self) -> Result<FailoverOperation, EngineError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    fn is_sweepable(&self) -> bool {
        self.backup_status == BackupStatus::Pending && self.retry_count < self.max_retries
    }
}

impl From<FailoverRecord> for FailoverRecordResponse {
    fn from(r: FailoverRecord) -> Self {
        Self {
            id: r.id,
            operation_kind: r.operation_kind,
            cause: r.cause,
            payload: r.payload,
            retry_count: r.retry_count,
            max_retries: r.max_retries,
            backup_status: r.backup_status,
            last_error: r.last_error,
            created_at: r.created_at.unix_timestamp(),
            resolved_at: r.resolved_at.map(OffsetDateTime::unix_timestamp),
        }
    }
}

/// Replays a captured operation.
#[async_trait]
pub trait RetryHandler: Send + Sync {
    async fn retry(&self, record: &FailoverRecord) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub attempted: u32,
    pub succeeded: u32,
    pub still_pending: u32,
    pub exhausted: u32,
    pub collected: u32,
}

impl std::fmt::Display for SweepSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "attempted {}, succeeded {}, pending {}, exhausted {}, collected {}",
            self.attempted, self.succeeded, self.still_pending, self.exhausted, self.collected
        )
    }
}

#[derive(Debug, Default)]
struct QueueState {
    records: VecDeque<FailoverRecord>,
    evicted_total: u64,
}

/// In-flight mark on one record, released on drop.
struct Claim<'a> {
    queue: &'a FailoverQueue,
    id: Uuid,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut state = self.queue.lock();
        if let Some(record) = state.records.iter_mut().find(|r| r.id == self.id) {
            record.in_flight = false;
        }
    }
}

pub struct FailoverQueue {
    capacity: usize,
    max_retries: u32,
    log: Arc<OperationLog>,
    state: Mutex<QueueState>,
}

impl FailoverQueue {
    pub fn new(capacity: usize, max_retries: u32, log: Arc<OperationLog>) -> Self {
        Self {
            capacity: capacity.max(1),
            max_retries: max_retries.max(1),
            log,
            state: Mutex::new(QueueState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Capture an operation for later retry.
    ///
    /// At capacity the oldest record that is not in flight is evicted and a
    /// CRITICAL entry is written. If every record is in flight the new one is
    /// refused with [`EngineError::QueueOverflow`].
    pub fn record(
        &self,
        operation: &FailoverOperation,
        cause: &EngineError,
    ) -> Result<Uuid, EngineError> {
        let record = FailoverRecord {
            id: Uuid::now_v7(),
            operation_kind: operation.kind(),
            creator_id: operation.creator_id(),
            cause: cause.detail(),
            payload: serde_json::to_value(operation)?,
            retry_count: 0,
            max_retries: self.max_retries,
            backup_status: BackupStatus::Pending,
            last_error: None,
            created_at: OffsetDateTime::now_utc(),
            resolved_at: None,
            in_flight: false,
        };
        let id = record.id;
        let kind = record.operation_kind;
        let creator_id = record.creator_id;

        let evicted = {
            let mut state = self.lock();
            let evicted = if state.records.len() >= self.capacity {
                let oldest_idle = state.records.iter().position(|r| !r.in_flight);
                match oldest_idle {
                    Some(index) => {
                        state.evicted_total += 1;
                        state.records.remove(index)
                    }
                    None => {
                        drop(state);
                        self.log.record(
                            LogEvent::critical(
                                "failover.overflow",
                                "failover queue full with every record in flight; operation dropped",
                            )
                            .creator(creator_id)
                            .meta("operation_kind", format!("{kind:?}"))
                            .meta("cause", cause.detail()),
                        );
                        return Err(EngineError::QueueOverflow);
                    }
                }
            } else {
                None
            };
            state.records.push_back(record);
            evicted
        };

        if let Some(evicted) = evicted {
            self.log.record(
                LogEvent::critical("failover.overflow", "failover queue at capacity; oldest record evicted")
                    .failover(evicted.id)
                    .creator(evicted.creator_id)
                    .meta("evicted_kind", format!("{:?}", evicted.operation_kind))
                    .meta("evicted_status", format!("{:?}", evicted.backup_status))
                    .meta("capacity", self.capacity as u64),
            );
        }
        self.log.record(
            LogEvent::error("failover.capture", "operation captured for retry")
                .failover(id)
                .creator(creator_id)
                .meta("operation_kind", format!("{kind:?}"))
                .meta("cause", cause.detail()),
        );
        Ok(id)
    }

    /// Ids eligible for the sweep, oldest first. Nothing is claimed yet.
    fn sweep_candidates(&self) -> Vec<Uuid> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.is_sweepable())
            .map(|r| r.id)
            .collect()
    }

    /// Mark one record in flight. The returned claim clears the mark when
    /// dropped, so a cancelled or panicking attempt leaves it retryable.
    fn claim(
        &self,
        id: Uuid,
        eligible: impl FnOnce(&FailoverRecord) -> bool,
    ) -> Option<(Claim<'_>, FailoverRecord)> {
        let mut state = self.lock();
        let record = state.records.iter_mut().find(|r| r.id == id)?;
        if record.in_flight || !eligible(&*record) {
            return None;
        }
        record.in_flight = true;
        Some((Claim { queue: self, id }, record.clone()))
    }

    /// Apply the outcome of one attempt. `None` if the record vanished.
    fn finish_attempt(
        &self,
        claim: Claim<'_>,
        outcome: Result<(), EngineError>,
    ) -> Option<FailoverRecord> {
        let id = claim.id;
        let updated = {
            let mut state = self.lock();
            let record = state.records.iter_mut().find(|r| r.id == id)?;
            record.in_flight = false;
            match &outcome {
                Ok(()) => {
                    record.backup_status = BackupStatus::Success;
                    record.resolved_at = Some(OffsetDateTime::now_utc());
                    record.last_error = None;
                }
                Err(e) => {
                    record.retry_count += 1;
                    record.last_error = Some(e.detail());
                    if record.retry_count >= record.max_retries || !e.is_transient() {
                        record.backup_status = BackupStatus::Exhausted;
                    }
                }
            }
            record.clone()
        };

        let event = match (&outcome, updated.backup_status) {
            (Ok(()), _) => LogEvent::info("failover.retry", "failover retry succeeded"),
            (Err(_), BackupStatus::Exhausted) => LogEvent::critical(
                "failover.retry",
                "failover record exhausted; manual intervention required",
            ),
            (Err(_), _) => LogEvent::warn("failover.retry", "failover retry failed"),
        };
        self.log.record(
            event
                .failover(updated.id)
                .creator(updated.creator_id)
                .meta("operation_kind", format!("{:?}", updated.operation_kind))
                .meta("retry_count", updated.retry_count)
                .meta("max_retries", updated.max_retries)
                .meta("last_error", updated.last_error.clone()),
        );
        Some(updated)
    }

    /// Retry every pending record once. Records are claimed one at a time,
    /// so cancelling the sweep strands at most the record being retried, and
    /// only until its claim is dropped.
    #[tracing::instrument(skip_all)]
    pub async fn process_queue(&self, handler: &dyn RetryHandler) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for id in self.sweep_candidates() {
            let Some((claim, record)) = self.claim(id, FailoverRecord::is_sweepable) else {
                continue;
            };
            summary.attempted += 1;
            let outcome = handler.retry(&record).await;
            match self.finish_attempt(claim, outcome).map(|r| r.backup_status) {
                Some(BackupStatus::Success) => summary.succeeded += 1,
                Some(BackupStatus::Exhausted) => summary.exhausted += 1,
                Some(BackupStatus::Pending) | None => summary.still_pending += 1,
            }
        }
        summary
    }

    /// Operator-triggered single attempt. Exhausted records may be retried;
    /// a failed attempt leaves them exhausted.
    #[tracing::instrument(skip(self, handler))]
    pub async fn retry_record(
        &self,
        id: Uuid,
        handler: &dyn RetryHandler,
    ) -> Result<FailoverRecord, EngineError> {
        let current = self
            .get(id)
            .ok_or_else(|| EngineError::not_found("failover record", id))?;
        if current.backup_status == BackupStatus::Success {
            return Ok(current);
        }
        let (claim, record) = self
            .claim(id, |r| r.backup_status != BackupStatus::Success)
            .ok_or_else(|| EngineError::DuplicateOperation {
                key: format!("failover record {id} is already being retried"),
            })?;

        self.log.record(
            LogEvent::info("failover.manual_retry", "operator retry requested")
                .failover(id)
                .creator(record.creator_id),
        );
        let outcome = handler.retry(&record).await;
        let updated = self
            .finish_attempt(claim, outcome)
            .ok_or_else(|| EngineError::not_found("failover record", id))?;
        if updated.backup_status == BackupStatus::Exhausted {
            return Err(EngineError::RetryExhausted {
                id,
                attempts: updated.retry_count,
            });
        }
        Ok(updated)
    }

    /// Drop success records resolved before `now - retention`.
    pub fn clear_resolved(&self, retention: time::Duration) -> u32 {
        let Some(cutoff) = OffsetDateTime::now_utc().checked_sub(retention) else {
            return 0;
        };
        let mut state = self.lock();
        let before = state.records.len();
        state.records.retain(|r| {
            !(r.backup_status == BackupStatus::Success
                && r.resolved_at.is_some_and(|at| at <= cutoff))
        });
        (before - state.records.len()) as u32
    }

    pub fn get(&self, id: Uuid) -> Option<FailoverRecord> {
        self.lock().records.iter().find(|r| r.id == id).cloned()
    }

    /// Records touching a creator, newest first.
    pub fn records_for_creator(&self, creator_id: Uuid) -> Vec<FailoverRecord> {
        self.lock()
            .records
            .iter()
            .rev()
            .filter(|r| r.creator_id == Some(creator_id))
            .cloned()
            .collect()
    }

    pub fn status(&self) -> FailoverQueueStatus {
        let state = self.lock();
        let counts = state.records.iter().map(|r| r.backup_status).counts();
        let count = |status: BackupStatus| counts.get(&status).copied().unwrap_or(0) as u64;
        FailoverQueueStatus {
            total: state.records.len() as u64,
            pending: count(BackupStatus::Pending),
            success: count(BackupStatus::Success),
            exhausted: count(BackupStatus::Exhausted),
            in_flight: state.records.iter().filter(|r| r.in_flight).count() as u64,
            capacity: self.capacity as u64,
            evicted_total: state.evicted_total,
            oldest_pending_at: state
                .records
                .iter()
                .filter(|r| r.backup_status == BackupStatus::Pending)
                .map(|r| r.created_at.unix_timestamp())
                .min(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
