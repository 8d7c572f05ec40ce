//! HTTP client for a Stripe-compatible gateway API.
//!
//! Reads are `GET` requests, writes are form-encoded `POST` requests, and
//! transfers carry an `Idempotency-Key` header.

use super::{
    ConnectedAccount, ConnectedAccountRequest, GatewayError, GatewayTransfer, OnboardingLink,
    PaymentGateway, PaymentIntent, TransferReceipt, TransferRequest,
};
use crate::entities::PayoutStatus;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    http_client: reqwest::Client,
    base_url: Url,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransferObject {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    arrival_date: Option<i64>,
    #[serde(default)]
    failure_code: Option<String>,
    #[serde(default)]
    failure_message: Option<String>,
    #[serde(default)]
    reversed: bool,
}

impl TransferObject {
    fn into_transfer(self) -> Result<GatewayTransfer, GatewayError> {
        let status = match self.status.as_deref() {
            Some("pending") => PayoutStatus::Pending,
            Some("in_transit") => PayoutStatus::InTransit,
            Some("paid") => PayoutStatus::Paid,
            Some("failed") => PayoutStatus::Failed,
            Some("canceled") | Some("cancelled") => PayoutStatus::Cancelled,
            Some(other) => {
                return Err(GatewayError::Parse(format!(
                    "unknown transfer status: {other}"
                )));
            }
            // Plain transfers settle immediately unless reversed.
            None if self.reversed => PayoutStatus::Cancelled,
            None => PayoutStatus::Paid,
        };
        Ok(GatewayTransfer {
            id: self.id,
            amount: self.amount,
            currency: self.currency,
            status,
            arrival_date: self.arrival_date,
            failure_code: self.failure_code,
            failure_message: self.failure_message,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AccountObject {
    id: String,
    #[serde(default)]
    payouts_enabled: bool,
    #[serde(default)]
    details_submitted: bool,
    #[serde(default)]
    requirements: Option<AccountRequirements>,
}

#[derive(Debug, Deserialize)]
struct AccountRequirements {
    #[serde(default)]
    disabled_reason: Option<String>,
}

impl From<AccountObject> for ConnectedAccount {
    fn from(a: AccountObject) -> Self {
        Self {
            id: a.id,
            payouts_enabled: a.payouts_enabled,
            details_submitted: a.details_submitted,
            disabled_reason: a.requirements.and_then(|r| r.disabled_reason),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountLinkObject {
    url: String,
    expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct IdObject {
    id: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: Url, secret_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url,
            secret_key: secret_key.into(),
        }
    }

    fn url(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::Parse(format!("invalid gateway url: {e}")))
    }

    async fn read<T: DeserializeOwned>(
        response: reqwest::Response,
        object_id: &str,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| GatewayError::Parse(e.to_string()));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(object_id.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
            .ok()
            .map(|e| match (e.error.code, e.error.message) {
                (Some(code), Some(message)) => format!("{code}: {message}"),
                (None, Some(message)) => message,
                (Some(code), None) => code,
                (None, None) => String::new(),
            })
            .unwrap_or(body);
        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, object_id: &str) -> Result<T, GatewayError> {
        debug!(path, "Gateway GET");
        let response = self
            .http_client
            .get(self.url(path)?)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::read(response, object_id).await
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn ping(&self) -> Result<(), GatewayError> {
        let _: serde_json::Value = self.get("/v1/balance", "balance").await?;
        Ok(())
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        self.get(&format!("/v1/payment_intents/{intent_id}"), intent_id)
            .await
    }

    async fn create_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt, GatewayError> {
        let mut form = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.clone()),
            ("destination".to_string(), request.destination.clone()),
        ];
        form.extend(
            request
                .metadata
                .iter()
                .map(|(k, v)| (format!("metadata[{k}]"), v.clone())),
        );
        debug!(idempotency_key = %request.idempotency_key, "Gateway create transfer");
        let response = self
            .http_client
            .post(self.url("/v1/transfers")?)
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", request.idempotency_key.to_string())
            .form(&form)
            .send()
            .await?;
        let created: IdObject = Self::read(response, &request.destination).await?;
        Ok(TransferReceipt {
            transfer_id: created.id,
        })
    }

    async fn retrieve_transfer(&self, transfer_id: &str) -> Result<GatewayTransfer, GatewayError> {
        let object: TransferObject = self
            .get(&format!("/v1/transfers/{transfer_id}"), transfer_id)
            .await?;
        object.into_transfer()
    }

    async fn create_connected_account(
        &self,
        request: &ConnectedAccountRequest,
    ) -> Result<ConnectedAccount, GatewayError> {
        let form = [
            ("type", "express".to_string()),
            ("email", request.email.clone()),
            ("country", request.country.clone()),
            ("capabilities[transfers][requested]", "true".to_string()),
            ("metadata[creator_id]", request.creator_id.to_string()),
        ];
        let response = self
            .http_client
            .post(self.url("/v1/accounts")?)
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", format!("account-{}", request.creator_id))
            .form(&form)
            .send()
            .await?;
        let account: AccountObject = Self::read(response, "account").await?;
        Ok(account.into())
    }

    async fn retrieve_connected_account(
        &self,
        account_id: &str,
    ) -> Result<ConnectedAccount, GatewayError> {
        let account: AccountObject = self
            .get(&format!("/v1/accounts/{account_id}"), account_id)
            .await?;
        Ok(account.into())
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<OnboardingLink, GatewayError> {
        let form = [
            ("account", account_id),
            ("refresh_url", refresh_url),
            ("return_url", return_url),
            ("type", "account_onboarding"),
        ];
        let response = self
            .http_client
            .post(self.url("/v1/account_links")?)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;
        let link: AccountLinkObject = Self::read(response, account_id).await?;
        Ok(OnboardingLink {
            url: link.url,
            expires_at: link.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payout_style_transfer_maps_status() {
        let object: TransferObject = serde_json::from_str(
            r#"{"id":"po_1","amount":500,"currency":"usd","status":"in_transit","arrival_date":1700000000}"#,
        )
        .unwrap();
        let transfer = object.into_transfer().unwrap();
        assert_eq!(transfer.status, PayoutStatus::InTransit);
        assert_eq!(transfer.arrival_date, Some(1_700_000_000));
    }

    #[test]
    fn plain_transfer_without_status_is_paid_unless_reversed() {
        let paid: TransferObject =
            serde_json::from_str(r#"{"id":"tr_1","amount":500,"currency":"usd"}"#).unwrap();
        assert_eq!(paid.into_transfer().unwrap().status, PayoutStatus::Paid);

        let reversed: TransferObject = serde_json::from_str(
            r#"{"id":"tr_2","amount":500,"currency":"usd","reversed":true}"#,
        )
        .unwrap();
        assert_eq!(
            reversed.into_transfer().unwrap().status,
            PayoutStatus::Cancelled
        );
    }

    #[test]
    fn unknown_transfer_status_is_a_parse_error() {
        let object: TransferObject = serde_json::from_str(
            r#"{"id":"tr_3","amount":1,"currency":"usd","status":"teleported"}"#,
        )
        .unwrap();
        assert!(matches!(object.into_transfer(), Err(GatewayError::Parse(_))));
    }

    #[test]
    fn account_requirements_flatten_into_disabled_reason() {
        let object: AccountObject = serde_json::from_str(
            r#"{"id":"acct_1","payouts_enabled":false,"details_submitted":true,
                "requirements":{"disabled_reason":"requirements.past_due"}}"#,
        )
        .unwrap();
        let account = ConnectedAccount::from(object);
        assert_eq!(account.disabled_reason.as_deref(), Some("requirements.past_due"));
    }
}
