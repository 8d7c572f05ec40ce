//! Service API client (platform backend → fanpay server).
//!
//! All requests use body-signed HMAC-SHA256 authentication via
//! [`SignedObject`].

use reqwest::Client;
use url::Url;
use uuid::Uuid;

use super::{ClientError, parse_response};
use crate::objects::creators::{
    ConnectedAccountResponse, OnboardCreatorRequest, OnboardingLinkRequest, OnboardingLinkResponse,
};
use crate::objects::payments::{
    PaymentResult, ProcessPaymentRequest, RefundRequest, TransactionResponse,
};
use crate::objects::payouts::{
    BalanceResponse, CreatorRequest, GetPayoutRequest, InitiatePayoutRequest, PayoutResponse,
};
use crate::signature::{SIGNATURE_HEADER, Signature, SignedObject};

/// Typed HTTP client for the fanpay **Service API**.
///
/// Every request body is signed with
/// `HMAC-SHA256("{timestamp}.{json}", service_secret)`.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    base_url: Url,
    secret: Vec<u8>,
}

impl ServiceClient {
    /// Create a new `ServiceClient`.
    ///
    /// * `base_url` – root URL of the fanpay server.
    /// * `service_secret` – the shared HMAC secret for body signing.
    pub fn new(base_url: Url, service_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            secret: service_secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    async fn signed_post<B: Signature, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: B,
    ) -> Result<T, ClientError> {
        let signed = SignedObject::new(body, &self.secret).map_err(ClientError::Json)?;
        let url = self.base_url.join(path)?;

        let resp = self
            .http
            .post(url)
            .header(SIGNATURE_HEADER, signed.to_header())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(signed.json)
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `POST /api/v1/service/payments` – confirm a gateway payment.
    ///
    /// Precondition failures come back as a [`PaymentResult`] with
    /// `success = false`, not as a [`ClientError`].
    pub async fn process_payment(
        &self,
        payload: ProcessPaymentRequest,
    ) -> Result<PaymentResult, ClientError> {
        let signed = SignedObject::new(payload, &self.secret).map_err(ClientError::Json)?;
        let url = self.base_url.join("/api/v1/service/payments")?;

        let resp = self
            .http
            .post(url)
            .header(SIGNATURE_HEADER, signed.to_header())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(signed.json)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let bytes = resp.bytes().await?;
            return serde_json::from_slice(&bytes).map_err(ClientError::Json);
        }
        parse_response(resp).await
    }

    /// `POST /api/v1/service/transactions/refund`
    pub async fn refund(&self, transaction_id: Uuid) -> Result<TransactionResponse, ClientError> {
        self.signed_post(
            "/api/v1/service/transactions/refund",
            RefundRequest { transaction_id },
        )
        .await
    }

    /// `POST /api/v1/service/payouts` – pay out part of a creator's balance.
    pub async fn initiate_payout(
        &self,
        creator_id: Uuid,
        amount: i64,
    ) -> Result<PayoutResponse, ClientError> {
        self.signed_post(
            "/api/v1/service/payouts",
            InitiatePayoutRequest { creator_id, amount },
        )
        .await
    }

    /// `POST /api/v1/service/payouts/status`
    pub async fn payout_status(&self, payout_id: Uuid) -> Result<PayoutResponse, ClientError> {
        self.signed_post(
            "/api/v1/service/payouts/status",
            GetPayoutRequest { payout_id },
        )
        .await
    }

    /// `POST /api/v1/service/creators/payouts`
    pub async fn payout_history(
        &self,
        creator_id: Uuid,
    ) -> Result<Vec<PayoutResponse>, ClientError> {
        self.signed_post(
            "/api/v1/service/creators/payouts",
            CreatorRequest { creator_id },
        )
        .await
    }

    /// `POST /api/v1/service/creators/balance`
    pub async fn balance(&self, creator_id: Uuid) -> Result<BalanceResponse, ClientError> {
        self.signed_post(
            "/api/v1/service/creators/balance",
            CreatorRequest { creator_id },
        )
        .await
    }

    /// `POST /api/v1/service/creators/onboard`
    pub async fn onboard_creator(
        &self,
        payload: OnboardCreatorRequest,
    ) -> Result<ConnectedAccountResponse, ClientError> {
        self.signed_post("/api/v1/service/creators/onboard", payload)
            .await
    }

    /// `POST /api/v1/service/creators/onboarding-link`
    pub async fn onboarding_link(
        &self,
        payload: OnboardingLinkRequest,
    ) -> Result<OnboardingLinkResponse, ClientError> {
        self.signed_post("/api/v1/service/creators/onboarding-link", payload)
            .await
    }
}
