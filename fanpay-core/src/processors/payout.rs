//! Payout orchestrator.
//!
//! A payout is written as `pending` before the gateway is called, so the
//! amount is reserved against the creator's available balance while the
//! transfer is outstanding. The balance check and the insert commit
//! together under the creator's row lock.
//!
//! The payout id is chosen before anything is written and travels with every
//! deferred retry. It doubles as the transfer's idempotency key, so a replay
//! resumes the original reservation and transfer instead of minting new ones.

use crate::entities::{AccountStatus, Payout, PayoutStatus};
use crate::error::EngineError;
use crate::gateway::{GatewayError, GatewayTransfer, PaymentGateway, TransferRequest};
use crate::ledger::TransactionLedger;
use crate::oplog::{LogEvent, OperationLog};
use crate::processors::failover::{FailoverOperation, FailoverQueue};
use crate::store::{LedgerStore, ReserveOutcome};
use fanpay_sdk::objects::{
    BatchPayoutFailure, BatchPayoutResult, PayoutDiscrepancyResponse,
    PayoutIntegrityReportResponse,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutDiscrepancyKind {
    AmountMismatch { local: i64, gateway: i64 },
    CurrencyMismatch { local: String, gateway: String },
    MissingAtGateway,
    /// The gateway could not be asked.
    Unverifiable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutDiscrepancy {
    pub payout_id: Uuid,
    pub kind: PayoutDiscrepancyKind,
}

impl From<PayoutDiscrepancy> for PayoutDiscrepancyResponse {
    fn from(d: PayoutDiscrepancy) -> Self {
        let (kind, detail) = match d.kind {
            PayoutDiscrepancyKind::AmountMismatch { local, gateway } => (
                "amount_mismatch",
                format!("ledger has {local}, gateway has {gateway}"),
            ),
            PayoutDiscrepancyKind::CurrencyMismatch { local, gateway } => (
                "currency_mismatch",
                format!("ledger has {local}, gateway has {gateway}"),
            ),
            PayoutDiscrepancyKind::MissingAtGateway => (
                "missing_at_gateway",
                "gateway has no transfer with this id".to_string(),
            ),
            PayoutDiscrepancyKind::Unverifiable(reason) => ("unverifiable", reason),
        };
        Self {
            payout_id: d.payout_id,
            kind: kind.to_string(),
            detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutIntegrityReport {
    pub generated_at: OffsetDateTime,
    pub checked: u64,
    pub discrepancies: Vec<PayoutDiscrepancy>,
}

impl From<PayoutIntegrityReport> for PayoutIntegrityReportResponse {
    fn from(r: PayoutIntegrityReport) -> Self {
        Self {
            generated_at: r.generated_at.unix_timestamp(),
            checked: r.checked,
            discrepancies: r.discrepancies.into_iter().map(Into::into).collect(),
        }
    }
}

/// Releases a creator's payout slot on drop.
struct CreatorSlot<'a> {
    in_progress: &'a Mutex<HashSet<Uuid>>,
    creator_id: Uuid,
}

impl Drop for CreatorSlot<'_> {
    fn drop(&mut self) {
        self.in_progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.creator_id);
    }
}

enum Reservation {
    /// Stored but not yet transferred.
    Fresh(Payout, String),
    /// Already handed to the gateway or closed.
    Settled(Payout),
}

pub struct PayoutOrchestrator {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    ledger: Arc<TransactionLedger>,
    currency: String,
    batch_step_timeout: Duration,
    failover: Arc<FailoverQueue>,
    log: Arc<OperationLog>,
    in_progress: Mutex<HashSet<Uuid>>,
}

impl PayoutOrchestrator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        ledger: Arc<TransactionLedger>,
        currency: impl Into<String>,
        batch_step_timeout: Duration,
        failover: Arc<FailoverQueue>,
        log: Arc<OperationLog>,
    ) -> Self {
        Self {
            store,
            gateway,
            ledger,
            currency: currency.into(),
            batch_step_timeout,
            failover,
            log,
            in_progress: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, creator_id: Uuid) -> Result<CreatorSlot<'_>, EngineError> {
        let mut in_progress = self.in_progress.lock().unwrap_or_else(|e| e.into_inner());
        if !in_progress.insert(creator_id) {
            return Err(EngineError::DuplicateOperation {
                key: format!("payout already in progress for creator {creator_id}"),
            });
        }
        Ok(CreatorSlot {
            in_progress: &self.in_progress,
            creator_id,
        })
    }

    fn defer(&self, operation: FailoverOperation, cause: &EngineError) {
        // A refused capture is already logged as CRITICAL.
        let _ = self.failover.record(&operation, cause);
    }

    /// Transfer part of a creator's available balance to their connected account.
    #[tracing::instrument(skip(self))]
    pub async fn initiate_payout(
        &self,
        creator_id: Uuid,
        amount: i64,
    ) -> Result<Payout, EngineError> {
        self.initiate(Uuid::now_v7(), creator_id, amount, true).await
    }

    async fn initiate(
        &self,
        payout_id: Uuid,
        creator_id: Uuid,
        amount: i64,
        defer_on_failure: bool,
    ) -> Result<Payout, EngineError> {
        if amount <= 0 {
            return Err(EngineError::InvalidRequest(format!(
                "payout amount must be positive, got {amount}"
            )));
        }
        let _slot = self.claim(creator_id)?;

        let (payout, destination) = match self.reserve(payout_id, creator_id, amount).await {
            Ok(Reservation::Fresh(payout, destination)) => (payout, destination),
            Ok(Reservation::Settled(payout)) => return Ok(payout),
            Err(e) => {
                self.log_failure(creator_id, Some(payout_id), amount, &e);
                if e.is_transient() && defer_on_failure {
                    self.defer(
                        FailoverOperation::PayoutRequest {
                            payout_id,
                            creator_id,
                            amount,
                        },
                        &e,
                    );
                }
                return Err(e);
            }
        };

        let payout = self.submit(payout, &destination, defer_on_failure).await?;
        self.log.record(
            LogEvent::info("payout.initiate", "payout submitted")
                .creator(creator_id)
                .payout(payout.id)
                .meta("amount", amount)
                .meta("currency", payout.currency.clone())
                .meta(
                    "gateway_transfer_id",
                    payout.gateway_transfer_id.clone().unwrap_or_default(),
                ),
        );
        Ok(payout)
    }

    async fn active_destination(&self, creator_id: Uuid) -> Result<String, EngineError> {
        let account = self
            .store
            .get_creator(creator_id)
            .await?
            .ok_or(EngineError::AccountNotFound { creator_id })?;
        let destination = account
            .connected_account_id
            .ok_or(EngineError::AccountNotFound { creator_id })?;
        if account.account_status != AccountStatus::Active {
            return Err(EngineError::AccountNotActive { creator_id });
        }
        Ok(destination)
    }

    /// Check preconditions and write the pending payout row. A row already
    /// stored under `payout_id` is resumed rather than reserved twice.
    async fn reserve(
        &self,
        payout_id: Uuid,
        creator_id: Uuid,
        amount: i64,
    ) -> Result<Reservation, EngineError> {
        let destination = self.active_destination(creator_id).await?;
        let payout = Payout::new_pending(payout_id, creator_id, amount, &self.currency);
        match self.store.reserve_payout(&payout).await? {
            ReserveOutcome::Reserved(payout) => Ok(Reservation::Fresh(payout, destination)),
            ReserveOutcome::AlreadyReserved(existing)
                if existing.gateway_transfer_id.is_some() || existing.status.is_terminal() =>
            {
                Ok(Reservation::Settled(existing))
            }
            ReserveOutcome::AlreadyReserved(existing) => {
                Ok(Reservation::Fresh(existing, destination))
            }
            ReserveOutcome::Insufficient { available } => Err(EngineError::InsufficientBalance {
                requested: amount,
                available,
            }),
        }
    }

    async fn submit(
        &self,
        mut payout: Payout,
        destination: &str,
        defer_on_failure: bool,
    ) -> Result<Payout, EngineError> {
        let request = TransferRequest {
            amount: payout.amount,
            currency: payout.currency.clone(),
            destination: destination.to_string(),
            idempotency_key: payout.id,
            metadata: BTreeMap::from([
                ("creator_id".to_string(), payout.creator_id.to_string()),
                ("payout_id".to_string(), payout.id.to_string()),
            ]),
        };
        match self.gateway.create_transfer(&request).await {
            Ok(receipt) => payout.gateway_transfer_id = Some(receipt.transfer_id),
            Err(e) => {
                let e = EngineError::from(e);
                self.log_failure(payout.creator_id, Some(payout.id), payout.amount, &e);
                if e.is_transient() {
                    if defer_on_failure {
                        self.defer(
                            FailoverOperation::PayoutTransfer {
                                payout_id: payout.id,
                                creator_id: payout.creator_id,
                            },
                            &e,
                        );
                    }
                } else {
                    self.release(payout, &e).await;
                }
                return Err(e);
            }
        }

        if let Err(e) = self.store.update_payout(&payout).await {
            let e = EngineError::from(e);
            self.log.record(
                LogEvent::error(
                    "payout.persist",
                    "transfer accepted by gateway but payout row not updated",
                )
                .creator(payout.creator_id)
                .payout(payout.id)
                .meta("error", e.detail()),
            );
            if defer_on_failure {
                self.defer(FailoverOperation::PayoutPersist { payout }, &e);
            }
            return Err(e);
        }
        Ok(payout)
    }

    /// Mark a rejected payout as failed so its amount is no longer reserved.
    async fn release(&self, mut payout: Payout, cause: &EngineError) {
        payout.status = PayoutStatus::Failed;
        payout.failure_code = Some(cause.code().as_str().to_string());
        payout.failure_message = Some(cause.to_string());
        if let Err(e) = self.store.update_payout(&payout).await {
            let e = EngineError::from(e);
            if e.is_transient() {
                self.defer(FailoverOperation::PayoutPersist { payout }, &e);
            }
        }
    }

    fn log_failure(&self, creator_id: Uuid, payout_id: Option<Uuid>, amount: i64, e: &EngineError) {
        let event = if e.is_transient() {
            LogEvent::error("payout.initiate", "payout deferred to failover")
        } else {
            LogEvent::warn("payout.initiate", "payout rejected")
        };
        let event = event
            .creator(creator_id)
            .meta("amount", amount)
            .meta("code", e.code().as_str())
            .meta("error", e.detail());
        self.log.record(match payout_id {
            Some(id) => event.payout(id),
            None => event,
        });
    }

    pub(crate) async fn replay_request(
        &self,
        payout_id: Uuid,
        creator_id: Uuid,
        amount: i64,
    ) -> Result<(), EngineError> {
        self.initiate(payout_id, creator_id, amount, false)
            .await
            .map(|_| ())
    }

    pub(crate) async fn replay_transfer(&self, payout_id: Uuid) -> Result<(), EngineError> {
        let payout = self
            .store
            .get_payout(payout_id)
            .await?
            .ok_or_else(|| EngineError::not_found("payout", payout_id))?;
        if payout.gateway_transfer_id.is_some() || payout.status.is_terminal() {
            return Ok(());
        }
        let destination = match self.active_destination(payout.creator_id).await {
            Ok(destination) => destination,
            Err(e) if !e.is_transient() => {
                self.release(payout, &e).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let submitted = self.submit(payout, &destination, false).await?;
        self.log.record(
            LogEvent::info("payout.replay", "deferred transfer submitted")
                .creator(submitted.creator_id)
                .payout(submitted.id),
        );
        Ok(())
    }

    pub(crate) async fn replay_persist(&self, payout: &Payout) -> Result<(), EngineError> {
        self.store.update_payout(payout).await?;
        Ok(())
    }

    /// Apply the gateway's view of a transfer. Returns whether anything changed.
    fn apply_transfer(payout: &mut Payout, transfer: &GatewayTransfer) -> bool {
        let arrival_date = transfer
            .arrival_date
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok());
        let changed = payout.status != transfer.status
            || payout.arrival_date != arrival_date
            || payout.failure_code != transfer.failure_code
            || payout.failure_message != transfer.failure_message;
        payout.status = transfer.status;
        payout.arrival_date = arrival_date;
        payout.failure_code = transfer.failure_code.clone();
        payout.failure_message = transfer.failure_message.clone();
        changed
    }

    async fn refresh(&self, mut payout: Payout) -> Result<Payout, EngineError> {
        let Some(transfer_id) = payout.gateway_transfer_id.clone() else {
            return Ok(payout);
        };
        let transfer = self.gateway.retrieve_transfer(&transfer_id).await?;
        let previous = payout.status;
        if Self::apply_transfer(&mut payout, &transfer) {
            self.store.update_payout(&payout).await?;
            self.log.record(
                LogEvent::info("payout.status", "payout status changed")
                    .creator(payout.creator_id)
                    .payout(payout.id)
                    .meta("from", format!("{previous:?}"))
                    .meta("to", format!("{:?}", payout.status)),
            );
        }
        Ok(payout)
    }

    /// Live status from the gateway, persisted when it changed.
    pub async fn get_payout_status(&self, payout_id: Uuid) -> Result<Payout, EngineError> {
        let payout = self
            .store
            .get_payout(payout_id)
            .await?
            .ok_or_else(|| EngineError::not_found("payout", payout_id))?;
        self.refresh(payout).await
    }

    /// A creator's payouts, newest first, with non-terminal ones refreshed.
    pub async fn get_payout_history(&self, creator_id: Uuid) -> Result<Vec<Payout>, EngineError> {
        let payouts = self.store.list_payouts(Some(creator_id)).await?;
        let mut history = Vec::with_capacity(payouts.len());
        for payout in payouts {
            if payout.status.is_terminal() {
                history.push(payout);
            } else {
                history.push(self.refresh(payout).await?);
            }
        }
        Ok(history)
    }

    /// Pay out the full available balance of every creator holding at least
    /// `min_amount`. Each creator is bounded by the batch step timeout; a
    /// slow step keeps running in the background while the batch moves on.
    #[tracing::instrument(skip(self))]
    pub async fn process_batch_payouts(
        self: &Arc<Self>,
        min_amount: i64,
    ) -> Result<BatchPayoutResult, EngineError> {
        let min_amount = min_amount.max(1);
        let creators = self.store.list_creators().await?;
        let mut result = BatchPayoutResult {
            successful: 0,
            failed: 0,
            total_amount: 0,
            failures: Vec::new(),
        };

        for account in creators {
            let creator_id = account.creator_id;
            let available = match self.ledger.get_balance(creator_id).await {
                Ok(balance) => balance.available(),
                Err(e) => {
                    result.failed += 1;
                    result.failures.push(BatchPayoutFailure {
                        creator_id,
                        code: e.code(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            if available < min_amount {
                continue;
            }

            let this = Arc::clone(self);
            let mut step =
                tokio::spawn(async move { this.initiate_payout(creator_id, available).await });
            let outcome = match tokio::time::timeout(self.batch_step_timeout, &mut step).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(join_error)) => Err(EngineError::Internal {
                    detail: format!("payout task failed: {join_error}"),
                }),
                Err(_) => {
                    warn!(%creator_id, "Batch payout step exceeded its time box");
                    Err(EngineError::Internal {
                        detail: format!(
                            "payout step exceeded {:?}; still running",
                            self.batch_step_timeout
                        ),
                    })
                }
            };
            match outcome {
                Ok(payout) => {
                    result.successful += 1;
                    result.total_amount += payout.amount;
                }
                Err(e) => {
                    result.failed += 1;
                    result.failures.push(BatchPayoutFailure {
                        creator_id,
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
            }
        }

        self.log.record(
            LogEvent::info("payout.batch", "batch payouts finished")
                .meta("successful", result.successful)
                .meta("failed", result.failed)
                .meta("total_amount", result.total_amount),
        );
        Ok(result)
    }

    /// Compare every submitted payout against the gateway's record.
    #[tracing::instrument(skip_all)]
    pub async fn validate_payout_integrity(&self) -> Result<PayoutIntegrityReport, EngineError> {
        let payouts = self.store.list_payouts(None).await?;
        let mut report = PayoutIntegrityReport {
            generated_at: OffsetDateTime::now_utc(),
            checked: 0,
            discrepancies: Vec::new(),
        };
        for payout in payouts {
            let Some(transfer_id) = payout.gateway_transfer_id.as_deref() else {
                continue;
            };
            report.checked += 1;
            let kind = match self.gateway.retrieve_transfer(transfer_id).await {
                Ok(transfer) if transfer.amount != payout.amount => {
                    Some(PayoutDiscrepancyKind::AmountMismatch {
                        local: payout.amount,
                        gateway: transfer.amount,
                    })
                }
                Ok(transfer) if !transfer.currency.eq_ignore_ascii_case(&payout.currency) => {
                    Some(PayoutDiscrepancyKind::CurrencyMismatch {
                        local: payout.currency.clone(),
                        gateway: transfer.currency,
                    })
                }
                Ok(_) => None,
                Err(GatewayError::NotFound(_)) => Some(PayoutDiscrepancyKind::MissingAtGateway),
                Err(e) => Some(PayoutDiscrepancyKind::Unverifiable(e.to_string())),
            };
            if let Some(kind) = kind {
                report.discrepancies.push(PayoutDiscrepancy {
                    payout_id: payout.id,
                    kind,
                });
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Category;
    use crate::gateway::IntentStatus;
    use crate::test_support::{Harness, payment_command};
    use fanpay_sdk::objects::{ErrorCode, OperationKind};

    async fn funded_creator(h: &Harness, gross: i64) -> Uuid {
        let creator = Uuid::new_v4();
        h.store
            .upsert_connected_account(creator, &format!("acct_{creator}"), AccountStatus::Active)
            .await
            .unwrap();
        let intent = format!("pi_{creator}");
        h.gateway.add_intent(&intent, gross, IntentStatus::Succeeded);
        h.engine
            .payments()
            .process_payment(payment_command(creator, gross, Category::Subscription, &intent))
            .await
            .unwrap();
        creator
    }

    #[tokio::test]
    async fn insufficient_balance_never_reaches_gateway() {
        let h = Harness::new();
        let creator = funded_creator(&h, 625).await;
        assert_eq!(h.engine.ledger().get_payout_balance(creator).await.unwrap(), 500);

        let err = h
            .engine
            .payouts()
            .initiate_payout(creator, 1_000)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientBalance {
                requested: 1_000,
                available: 500
            }
        ));
        assert_eq!(h.gateway.transfer_calls(), 0);
        assert!(h.store.list_payouts(Some(creator)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn payout_uses_its_id_as_idempotency_key_and_reserves_balance() {
        let h = Harness::new();
        let creator = funded_creator(&h, 10_000).await;

        let payout = h.engine.payouts().initiate_payout(creator, 3_000).await.unwrap();
        assert_eq!(payout.status, PayoutStatus::Pending);
        assert!(payout.gateway_transfer_id.is_some());
        assert_eq!(h.gateway.last_idempotency_key(), Some(payout.id));

        let balance = h.engine.ledger().get_balance(creator).await.unwrap();
        assert_eq!(balance.available(), 5_000);

        let err = h
            .engine
            .payouts()
            .initiate_payout(creator, 5_001)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn missing_or_inactive_account_is_rejected() {
        let h = Harness::new();
        let err = h
            .engine
            .payouts()
            .initiate_payout(Uuid::new_v4(), 100)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccountNotFound);

        let creator = funded_creator(&h, 1_000).await;
        h.store
            .upsert_connected_account(creator, "acct_x", AccountStatus::Inactive)
            .await
            .unwrap();
        let err = h.engine.payouts().initiate_payout(creator, 100).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccountNotActive);
        assert_eq!(h.gateway.transfer_calls(), 0);
    }

    #[tokio::test]
    async fn gateway_outage_defers_transfer_and_replay_submits_it() {
        let h = Harness::new();
        let creator = funded_creator(&h, 10_000).await;
        h.gateway.fail_transfers(true);

        let err = h.engine.payouts().initiate_payout(creator, 2_000).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::GatewayUnavailable);
        let records = h.engine.failover().records_for_creator(creator);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation_kind, OperationKind::Payout);

        // The pending row still reserves the amount.
        let balance = h.engine.ledger().get_balance(creator).await.unwrap();
        assert_eq!(balance.available(), 6_000);

        h.gateway.fail_transfers(false);
        let summary = h.engine.failover().process_queue(h.engine.as_ref()).await;
        assert_eq!(summary.succeeded, 1);
        let payouts = h.store.list_payouts(Some(creator)).await.unwrap();
        assert_eq!(payouts.len(), 1);
        assert!(payouts[0].gateway_transfer_id.is_some());
    }

    #[tokio::test]
    async fn lost_reservation_ack_is_resumed_not_duplicated() {
        let h = Harness::new();
        let creator = funded_creator(&h, 10_000).await;
        h.store.lose_next_acks(1);

        let err = h.engine.payouts().initiate_payout(creator, 2_000).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
        assert_eq!(h.gateway.transfer_calls(), 0);
        let rows = h.store.list_payouts(Some(creator)).await.unwrap();
        assert_eq!(rows.len(), 1);
        let records = h.engine.failover().records_for_creator(creator);
        assert_eq!(records.len(), 1);
        match records[0].operation().unwrap() {
            FailoverOperation::PayoutRequest { payout_id, .. } => {
                assert_eq!(payout_id, rows[0].id)
            }
            other => panic!("expected a deferred payout request, got {other:?}"),
        }

        let summary = h.engine.failover().process_queue(h.engine.as_ref()).await;
        assert_eq!(summary.succeeded, 1);
        let rows = h.store.list_payouts(Some(creator)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].gateway_transfer_id.is_some());
        assert_eq!(h.gateway.last_idempotency_key(), Some(rows[0].id));
        let balance = h.engine.ledger().get_balance(creator).await.unwrap();
        assert_eq!(balance.available(), 6_000);
    }

    #[tokio::test]
    async fn replayed_request_for_a_submitted_payout_is_a_no_op() {
        let h = Harness::new();
        let creator = funded_creator(&h, 10_000).await;
        let payout = h.engine.payouts().initiate_payout(creator, 1_000).await.unwrap();

        h.engine
            .payouts()
            .replay_request(payout.id, creator, 1_000)
            .await
            .unwrap();
        assert_eq!(h.gateway.transfer_calls(), 1);
        assert_eq!(h.store.list_payouts(Some(creator)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_payout_for_same_creator_is_rejected() {
        let h = Harness::new();
        let creator = funded_creator(&h, 10_000).await;
        let _slot = h.engine.payouts().claim(creator).unwrap();
        let err = h.engine.payouts().initiate_payout(creator, 100).await.unwrap_err();
        assert!(matches!(err, EngineError::DuplicateOperation { .. }));
    }

    #[tokio::test]
    async fn status_is_refreshed_from_gateway() {
        let h = Harness::new();
        let creator = funded_creator(&h, 10_000).await;
        let payout = h.engine.payouts().initiate_payout(creator, 1_000).await.unwrap();
        let transfer_id = payout.gateway_transfer_id.clone().unwrap();
        h.gateway
            .set_transfer_status(&transfer_id, PayoutStatus::Paid, Some(1_700_000_000));

        let refreshed = h.engine.payouts().get_payout_status(payout.id).await.unwrap();
        assert_eq!(refreshed.status, PayoutStatus::Paid);
        let stored = h.store.get_payout(payout.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PayoutStatus::Paid);

        let history = h.engine.payouts().get_payout_history(creator).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, PayoutStatus::Paid);
    }

    #[tokio::test]
    async fn batch_pays_creators_above_minimum() {
        let h = Harness::new();
        let rich = funded_creator(&h, 10_000).await;
        let poor = funded_creator(&h, 100).await;

        let result = h
            .engine
            .payouts()
            .process_batch_payouts(1_000)
            .await
            .unwrap();
        assert_eq!(result.successful, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(result.total_amount, 8_000);
        assert_eq!(h.store.list_payouts(Some(rich)).await.unwrap().len(), 1);
        assert!(h.store.list_payouts(Some(poor)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_isolates_a_failing_creator() {
        let h = Harness::new();
        funded_creator(&h, 10_000).await;
        let inactive = funded_creator(&h, 10_000).await;
        h.store
            .upsert_connected_account(inactive, "acct_gone", AccountStatus::Inactive)
            .await
            .unwrap();

        let result = h.engine.payouts().process_batch_payouts(1).await.unwrap();
        assert_eq!(result.successful, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.failures[0].creator_id, inactive);
        assert_eq!(result.failures[0].code, ErrorCode::AccountNotActive);
    }

    #[tokio::test]
    async fn integrity_report_flags_gateway_mismatch() {
        let h = Harness::new();
        let creator = funded_creator(&h, 10_000).await;
        let good = h.engine.payouts().initiate_payout(creator, 1_000).await.unwrap();
        let bad = h.engine.payouts().initiate_payout(creator, 2_000).await.unwrap();
        h.gateway
            .set_transfer_amount(bad.gateway_transfer_id.as_deref().unwrap(), 1_999);

        let report = h.engine.payouts().validate_payout_integrity().await.unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.discrepancies[0].payout_id, bad.id);
        assert_ne!(report.discrepancies[0].payout_id, good.id);
    }
}
