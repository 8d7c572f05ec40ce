use super::{
    ConnectedAccount, ConnectedAccountRequest, GatewayError, GatewayTransfer, OnboardingLink,
    PaymentGateway, PaymentIntent, TransferReceipt, TransferRequest,
};
use crate::utils::timeout::time_boxed;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Per-call deadline around any [`PaymentGateway`].
pub struct TimedPaymentGateway {
    inner: Arc<dyn PaymentGateway>,
    limit: Duration,
}

impl TimedPaymentGateway {
    pub fn new(inner: Arc<dyn PaymentGateway>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl PaymentGateway for TimedPaymentGateway {
    async fn ping(&self) -> Result<(), GatewayError> {
        time_boxed(self.limit, self.inner.ping()).await
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        time_boxed(self.limit, self.inner.retrieve_payment_intent(intent_id)).await
    }

    async fn create_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, GatewayError> {
        time_boxed(self.limit, self.inner.create_transfer(request)).await
    }

    async fn retrieve_transfer(&self, transfer_id: &str) -> Result<GatewayTransfer, GatewayError> {
        time_boxed(self.limit, self.inner.retrieve_transfer(transfer_id)).await
    }

    async fn create_connected_account(
        &self,
        request: &ConnectedAccountRequest,
    ) -> Result<ConnectedAccount, GatewayError> {
        time_boxed(self.limit, self.inner.create_connected_account(request)).await
    }

    async fn retrieve_connected_account(
        &self,
        account_id: &str,
    ) -> Result<ConnectedAccount, GatewayError> {
        time_boxed(self.limit, self.inner.retrieve_connected_account(account_id)).await
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<OnboardingLink, GatewayError> {
        time_boxed(
            self.limit,
            self.inner
                .create_onboarding_link(account_id, refresh_url, return_url),
        )
        .await
    }
}
