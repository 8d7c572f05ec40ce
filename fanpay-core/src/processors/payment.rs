//! Payment processor.
//!
//! Confirms a gateway payment intent, resolves the category split and writes
//! the transaction together with the beneficiary's earnings credit. The
//! gateway intent id is the idempotency key: replaying a request never
//! credits twice.

use crate::entities::{Category, Transaction, TransactionStatus};
use crate::error::EngineError;
use crate::fees::FeeSchedule;
use crate::gateway::{IntentStatus, PaymentGateway};
use crate::oplog::{LogEvent, OperationLog};
use crate::processors::failover::{FailoverOperation, FailoverQueue};
use crate::ledger::TransactionLedger;
use crate::store::ApplyOutcome;
use fanpay_sdk::objects::{PaymentResult, ProcessPaymentRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCommand {
    pub payer_id: Uuid,
    pub beneficiary_id: Option<Uuid>,
    pub amount: i64,
    pub category: Category,
    pub gateway_intent_id: String,
    pub description: Option<String>,
}

impl From<ProcessPaymentRequest> for PaymentCommand {
    fn from(r: ProcessPaymentRequest) -> Self {
        Self {
            payer_id: r.payer_id,
            beneficiary_id: r.beneficiary_id,
            amount: r.amount,
            category: r.category.into(),
            gateway_intent_id: r.gateway_intent_id,
            description: r.description,
        }
    }
}

impl PaymentCommand {
    fn validate(&self) -> Result<(), EngineError> {
        if self.amount <= 0 {
            return Err(EngineError::InvalidRequest(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.gateway_intent_id.trim().is_empty() {
            return Err(EngineError::InvalidRequest(
                "gateway intent id is required".to_string(),
            ));
        }
        if self.category == Category::Payout {
            return Err(EngineError::InvalidRequest(
                "payout is not a payment category".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether an already stored row was produced by an identical request.
    fn same_as(&self, existing: &Transaction) -> bool {
        existing.payer_id == self.payer_id
            && existing.beneficiary_id == self.beneficiary_id
            && existing.amount == self.amount
            && existing.category == self.category
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub transaction: Transaction,
    /// The intent had already been applied; nothing new was credited.
    pub replayed: bool,
}

impl From<PaymentReceipt> for PaymentResult {
    fn from(r: PaymentReceipt) -> Self {
        Self {
            success: true,
            transaction_id: Some(r.transaction.id),
            creator_earnings: Some(r.transaction.creator_earnings()),
            platform_fee: Some(r.transaction.platform_fee),
            replayed: r.replayed,
            error: None,
        }
    }
}

pub struct PaymentProcessor {
    ledger: Arc<TransactionLedger>,
    gateway: Arc<dyn PaymentGateway>,
    fees: FeeSchedule,
    currency: String,
    failover: Arc<FailoverQueue>,
    log: Arc<OperationLog>,
}

impl PaymentProcessor {
    pub fn new(
        ledger: Arc<TransactionLedger>,
        gateway: Arc<dyn PaymentGateway>,
        fees: FeeSchedule,
        currency: impl Into<String>,
        failover: Arc<FailoverQueue>,
        log: Arc<OperationLog>,
    ) -> Self {
        Self {
            ledger,
            gateway,
            fees,
            currency: currency.into(),
            failover,
            log,
        }
    }

    /// Verify the intent with the gateway and apply the payment.
    ///
    /// Infrastructure failures are captured for retry before the error is
    /// returned. Precondition failures are returned without side effects.
    #[tracing::instrument(
        skip_all,
        fields(intent = %command.gateway_intent_id, category = %command.category)
    )]
    pub async fn process_payment(
        &self,
        command: PaymentCommand,
    ) -> Result<PaymentReceipt, EngineError> {
        command.validate()?;
        match self.execute(&command).await {
            Ok(receipt) => {
                let message = if receipt.replayed {
                    "payment replay ignored"
                } else {
                    "payment applied"
                };
                self.log.record(
                    LogEvent::info("payment.process", message)
                        .payer(command.payer_id)
                        .creator(command.beneficiary_id)
                        .transaction(receipt.transaction.id)
                        .meta("amount", command.amount)
                        .meta("platform_fee", receipt.transaction.platform_fee)
                        .meta("category", command.category.to_string())
                        .meta("gateway_intent_id", command.gateway_intent_id.clone()),
                );
                Ok(receipt)
            }
            Err(e) if e.is_transient() => {
                self.log.record(
                    LogEvent::error("payment.process", "payment deferred to failover")
                        .payer(command.payer_id)
                        .creator(command.beneficiary_id)
                        .meta("gateway_intent_id", command.gateway_intent_id.clone())
                        .meta("error", e.detail()),
                );
                let operation = FailoverOperation::Payment { command };
                // A refused capture is already logged as CRITICAL.
                let _ = self.failover.record(&operation, &e);
                Err(e)
            }
            Err(e) => {
                self.log.record(
                    LogEvent::warn("payment.process", "payment rejected")
                        .payer(command.payer_id)
                        .creator(command.beneficiary_id)
                        .meta("gateway_intent_id", command.gateway_intent_id.clone())
                        .meta("code", e.code().as_str())
                        .meta("error", e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Failover replay. Safe to repeat because applying is idempotent.
    pub(crate) async fn replay(&self, command: &PaymentCommand) -> Result<(), EngineError> {
        command.validate()?;
        let receipt = self.execute(command).await?;
        self.log.record(
            LogEvent::info("payment.replay", "deferred payment applied")
                .payer(command.payer_id)
                .creator(command.beneficiary_id)
                .transaction(receipt.transaction.id)
                .meta("replayed", receipt.replayed),
        );
        Ok(())
    }

    async fn execute(&self, command: &PaymentCommand) -> Result<PaymentReceipt, EngineError> {
        let intent = self
            .gateway
            .retrieve_payment_intent(&command.gateway_intent_id)
            .await?;
        if intent.status != IntentStatus::Succeeded {
            return Err(EngineError::IntentNotSucceeded {
                intent_id: intent.id,
                status: intent.status.as_str().to_string(),
            });
        }
        if intent.amount != command.amount {
            return Err(EngineError::AmountMismatch {
                requested: command.amount,
                gateway: intent.amount,
            });
        }
        if !intent.currency.eq_ignore_ascii_case(&self.currency) {
            return Err(EngineError::InvalidRequest(format!(
                "intent currency {} does not match {}",
                intent.currency, self.currency
            )));
        }

        let platform_fee = match command.beneficiary_id {
            Some(_) => {
                self.fees
                    .resolve_category_split(command.amount, command.category)
                    .map_err(|e| EngineError::InvalidRequest(e.to_string()))?
                    .platform_fee
            }
            None => command.amount,
        };
        let transaction = Transaction {
            id: Uuid::now_v7(),
            payer_id: command.payer_id,
            beneficiary_id: command.beneficiary_id,
            category: command.category,
            amount: command.amount,
            platform_fee,
            status: TransactionStatus::Completed,
            description: command
                .description
                .clone()
                .unwrap_or_else(|| format!("{} payment", command.category)),
            gateway_intent_id: Some(command.gateway_intent_id.clone()),
            created_at: OffsetDateTime::now_utc(),
        };

        match self.ledger.record(transaction).await? {
            ApplyOutcome::Applied(transaction) => Ok(PaymentReceipt {
                transaction,
                replayed: false,
            }),
            ApplyOutcome::AlreadyApplied(existing) if command.same_as(&existing) => {
                Ok(PaymentReceipt {
                    transaction: existing,
                    replayed: true,
                })
            }
            ApplyOutcome::AlreadyApplied(existing) => Err(EngineError::DuplicateOperation {
                key: format!(
                    "gateway intent {} already applied as transaction {}",
                    command.gateway_intent_id, existing.id
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Harness, payment_command};
    use crate::store::LedgerStore;
    use fanpay_sdk::objects::{BackupStatus, OperationKind};

    #[tokio::test]
    async fn subscription_payment_credits_eighty_percent() {
        let h = Harness::new();
        let creator = Uuid::new_v4();
        h.gateway.add_intent("pi_1", 10_000, IntentStatus::Succeeded);

        let receipt = h
            .engine
            .payments()
            .process_payment(payment_command(creator, 10_000, Category::Subscription, "pi_1"))
            .await
            .unwrap();
        assert!(!receipt.replayed);
        assert_eq!(receipt.transaction.creator_earnings(), 8_000);
        assert_eq!(receipt.transaction.platform_fee, 2_000);
        assert_eq!(h.engine.ledger().get_payout_balance(creator).await.unwrap(), 8_000);
        let account = h.store.get_creator(creator).await.unwrap().unwrap();
        assert_eq!(account.total_earnings, 8_000);
    }

    #[tokio::test]
    async fn replay_does_not_credit_twice() {
        let h = Harness::new();
        let creator = Uuid::new_v4();
        h.gateway.add_intent("pi_2", 5_000, IntentStatus::Succeeded);
        let command = payment_command(creator, 5_000, Category::Tip, "pi_2");

        let first = h.engine.payments().process_payment(command.clone()).await.unwrap();
        let second = h.engine.payments().process_payment(command).await.unwrap();
        assert!(second.replayed);
        assert_eq!(first.transaction.id, second.transaction.id);
        assert_eq!(h.engine.ledger().get_payout_balance(creator).await.unwrap(), 4_000);
    }

    #[tokio::test]
    async fn conflicting_reuse_of_intent_is_a_duplicate() {
        let h = Harness::new();
        let creator = Uuid::new_v4();
        h.gateway.add_intent("pi_3", 5_000, IntentStatus::Succeeded);
        h.engine
            .payments()
            .process_payment(payment_command(creator, 5_000, Category::Tip, "pi_3"))
            .await
            .unwrap();

        let other_creator = Uuid::new_v4();
        let err = h
            .engine
            .payments()
            .process_payment(payment_command(other_creator, 5_000, Category::Tip, "pi_3"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateOperation { .. }));
    }

    #[tokio::test]
    async fn unconfirmed_intent_writes_nothing() {
        let h = Harness::new();
        h.gateway.add_intent("pi_4", 1_000, IntentStatus::Processing);
        let err = h
            .engine
            .payments()
            .process_payment(payment_command(Uuid::new_v4(), 1_000, Category::PayPerView, "pi_4"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::IntentNotSucceeded { .. }));
        assert!(h.store.list_transactions().await.unwrap().is_empty());
        assert!(h.engine.failover().is_empty());
    }

    #[tokio::test]
    async fn amount_mismatch_is_rejected() {
        let h = Harness::new();
        h.gateway.add_intent("pi_5", 999, IntentStatus::Succeeded);
        let err = h
            .engine
            .payments()
            .process_payment(payment_command(Uuid::new_v4(), 1_000, Category::Tip, "pi_5"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::AmountMismatch {
                requested: 1_000,
                gateway: 999
            }
        ));
    }

    #[tokio::test]
    async fn store_outage_is_captured_and_replayed() {
        let h = Harness::new();
        let creator = Uuid::new_v4();
        h.gateway.add_intent("pi_6", 2_000, IntentStatus::Succeeded);
        h.store.fail_next_writes(1);

        let err = h
            .engine
            .payments()
            .process_payment(payment_command(creator, 2_000, Category::Merchandise, "pi_6"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        let records = h.engine.failover().records_for_creator(creator);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation_kind, OperationKind::Payment);

        let summary = h.engine.failover().process_queue(h.engine.as_ref()).await;
        assert_eq!(summary.succeeded, 1);
        assert_eq!(
            h.engine.failover().get(records[0].id).unwrap().backup_status,
            BackupStatus::Success
        );
        assert_eq!(h.engine.ledger().get_payout_balance(creator).await.unwrap(), 1_800);
    }

    #[tokio::test]
    async fn payment_without_beneficiary_goes_to_platform() {
        let h = Harness::new();
        h.gateway.add_intent("pi_7", 700, IntentStatus::Succeeded);
        let mut command = payment_command(Uuid::new_v4(), 700, Category::Merchandise, "pi_7");
        command.beneficiary_id = None;
        let receipt = h.engine.payments().process_payment(command).await.unwrap();
        assert_eq!(receipt.transaction.platform_fee, 700);
    }

    #[tokio::test]
    async fn payout_category_is_invalid_for_payments() {
        let h = Harness::new();
        let err = h
            .engine
            .payments()
            .process_payment(payment_command(Uuid::new_v4(), 100, Category::Payout, "pi_8"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
        assert_eq!(h.gateway.intent_calls(), 0);
    }
}
