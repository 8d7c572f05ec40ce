//! Fixtures shared by the unit tests.

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::entities::{Category, PayoutStatus, Transaction, TransactionStatus};
use crate::gateway::{
    ConnectedAccount, ConnectedAccountRequest, GatewayError, GatewayTransfer, IntentStatus,
    OnboardingLink, PaymentGateway, PaymentIntent, TransferReceipt, TransferRequest,
};
use crate::processors::PaymentCommand;
use crate::store::InMemoryLedgerStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use uuid::Uuid;

pub(crate) fn completed_transaction(
    creator_id: Uuid,
    amount: i64,
    platform_fee: i64,
    intent: &str,
) -> Transaction {
    Transaction {
        id: Uuid::now_v7(),
        payer_id: Uuid::new_v4(),
        beneficiary_id: Some(creator_id),
        category: Category::Subscription,
        amount,
        platform_fee,
        status: TransactionStatus::Completed,
        description: "fixture".to_string(),
        gateway_intent_id: Some(intent.to_string()),
        created_at: OffsetDateTime::now_utc(),
    }
}

pub(crate) fn payment_command(
    creator_id: Uuid,
    amount: i64,
    category: Category,
    intent: &str,
) -> PaymentCommand {
    PaymentCommand {
        payer_id: Uuid::new_v4(),
        beneficiary_id: Some(creator_id),
        amount,
        category,
        gateway_intent_id: intent.to_string(),
        description: None,
    }
}

#[derive(Default)]
struct StubState {
    intents: HashMap<String, PaymentIntent>,
    transfers: HashMap<String, GatewayTransfer>,
    transfers_by_key: HashMap<Uuid, String>,
    accounts: HashMap<String, ConnectedAccount>,
    last_idempotency_key: Option<Uuid>,
}

/// Scripted in-process gateway with per-method call counters.
#[derive(Default)]
pub(crate) struct StubGateway {
    state: Mutex<StubState>,
    unavailable: AtomicBool,
    failing_transfers: AtomicBool,
    intent_calls: AtomicU32,
    transfer_calls: AtomicU32,
    account_calls: AtomicU32,
}

fn outage() -> GatewayError {
    GatewayError::Api {
        status: 503,
        message: "stub gateway offline".to_string(),
    }
}

impl StubGateway {
    fn state(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap()
    }

    fn check(&self) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(outage());
        }
        Ok(())
    }

    pub(crate) fn add_intent(&self, id: &str, amount: i64, status: IntentStatus) {
        self.state().intents.insert(
            id.to_string(),
            PaymentIntent {
                id: id.to_string(),
                status,
                amount,
                currency: "usd".to_string(),
            },
        );
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn fail_transfers(&self, failing: bool) {
        self.failing_transfers.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn set_transfer_status(
        &self,
        transfer_id: &str,
        status: PayoutStatus,
        arrival_date: Option<i64>,
    ) {
        if let Some(transfer) = self.state().transfers.get_mut(transfer_id) {
            transfer.status = status;
            transfer.arrival_date = arrival_date;
        }
    }

    pub(crate) fn set_transfer_amount(&self, transfer_id: &str, amount: i64) {
        if let Some(transfer) = self.state().transfers.get_mut(transfer_id) {
            transfer.amount = amount;
        }
    }

    pub(crate) fn enable_payouts(&self, account_id: &str) {
        if let Some(account) = self.state().accounts.get_mut(account_id) {
            account.payouts_enabled = true;
            account.details_submitted = true;
        }
    }

    pub(crate) fn last_idempotency_key(&self) -> Option<Uuid> {
        self.state().last_idempotency_key
    }

    pub(crate) fn intent_calls(&self) -> u32 {
        self.intent_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn transfer_calls(&self) -> u32 {
        self.transfer_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn account_calls(&self) -> u32 {
        self.account_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn ping(&self) -> Result<(), GatewayError> {
        self.check()
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        self.intent_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.state()
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(intent_id.to_string()))
    }

    async fn create_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, GatewayError> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if self.failing_transfers.load(Ordering::SeqCst) {
            return Err(outage());
        }
        let mut state = self.state();
        state.last_idempotency_key = Some(request.idempotency_key);
        if let Some(existing) = state.transfers_by_key.get(&request.idempotency_key) {
            return Ok(TransferReceipt {
                transfer_id: existing.clone(),
            });
        }
        let transfer_id = format!("tr_{}", state.transfers.len() + 1);
        state.transfers.insert(
            transfer_id.clone(),
            GatewayTransfer {
                id: transfer_id.clone(),
                amount: request.amount,
                currency: request.currency.clone(),
                status: PayoutStatus::Pending,
                arrival_date: None,
                failure_code: None,
                failure_message: None,
            },
        );
        state
            .transfers_by_key
            .insert(request.idempotency_key, transfer_id.clone());
        Ok(TransferReceipt { transfer_id })
    }

    async fn retrieve_transfer(&self, transfer_id: &str) -> Result<GatewayTransfer, GatewayError> {
        self.check()?;
        self.state()
            .transfers
            .get(transfer_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(transfer_id.to_string()))
    }

    async fn create_connected_account(
        &self,
        request: &ConnectedAccountRequest,
    ) -> Result<ConnectedAccount, GatewayError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let account = ConnectedAccount {
            id: format!("acct_{}", request.creator_id.simple()),
            payouts_enabled: false,
            details_submitted: false,
            disabled_reason: None,
        };
        self.state()
            .accounts
            .insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn retrieve_connected_account(
        &self,
        account_id: &str,
    ) -> Result<ConnectedAccount, GatewayError> {
        self.check()?;
        self.state()
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(account_id.to_string()))
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> Result<OnboardingLink, GatewayError> {
        self.check()?;
        if !self.state().accounts.contains_key(account_id) {
            return Err(GatewayError::NotFound(account_id.to_string()));
        }
        Ok(OnboardingLink {
            url: format!("https://connect.example/setup/{account_id}"),
            expires_at: OffsetDateTime::now_utc().unix_timestamp() + 300,
        })
    }
}

/// An engine over the in-memory store and the stub gateway.
pub(crate) struct Harness {
    pub engine: Arc<Engine>,
    pub store: Arc<InMemoryLedgerStore>,
    pub gateway: Arc<StubGateway>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub(crate) fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(InMemoryLedgerStore::new());
        let gateway = Arc::new(StubGateway::default());
        let engine = Arc::new(
            Engine::new(config, store.clone(), gateway.clone()).expect("test config is valid"),
        );
        Self {
            engine,
            store,
            gateway,
        }
    }
}
