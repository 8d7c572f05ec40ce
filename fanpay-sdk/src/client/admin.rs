//! Operator API client (admin tooling → fanpay server).
//!
//! All requests carry the plaintext admin secret in the
//! `Fanpay-Admin-Authorization` header.

use reqwest::Client;
use url::Url;
use uuid::Uuid;

use super::{ClientError, parse_response};
use crate::objects::creators::{ConnectedAccountResponse, FeeProfileResponse};
use crate::objects::admin::{
    FailoverQueueStatus, FailoverRecordResponse, IntegrityCheckResponse, LogEntryResponse,
    LogQuery, LogSummaryResponse, PayoutIntegrityReportResponse, ReconciliationReportResponse, ScheduledTask, TaskRunResponse,
};
use crate::signature::ADMIN_AUTH_HEADER;

/// Typed HTTP client for the fanpay **Operator API**.
///
/// Authentication uses a plaintext secret sent in the
/// `Fanpay-Admin-Authorization` header, verified server-side against an
/// argon2-hashed value.
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: Client,
    base_url: Url,
    admin_secret: String,
}

impl AdminClient {
    /// Create a new `AdminClient`.
    ///
    /// * `base_url` – root URL of the fanpay server.
    /// * `admin_secret` – the plaintext admin secret.
    pub fn new(base_url: Url, admin_secret: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            admin_secret: admin_secret.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.base_url.join(path)?;
        let resp = self
            .http
            .get(url)
            .header(ADMIN_AUTH_HEADER, &self.admin_secret)
            .send()
            .await?;
        parse_response(resp).await
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.base_url.join(path)?;
        let resp = self
            .http
            .post(url)
            .header(ADMIN_AUTH_HEADER, &self.admin_secret)
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/admin/failover` – failover queue status.
    pub async fn failover_status(&self) -> Result<FailoverQueueStatus, ClientError> {
        self.get("/api/v1/admin/failover").await
    }

    /// `GET /api/v1/admin/failover/creators/{creator_id}`
    pub async fn creator_failover_records(
        &self,
        creator_id: Uuid,
    ) -> Result<Vec<FailoverRecordResponse>, ClientError> {
        self.get(&format!("/api/v1/admin/failover/creators/{creator_id}"))
            .await
    }

    /// `POST /api/v1/admin/failover/{id}/retry` – manually retry one record.
    pub async fn retry_failover(&self, id: Uuid) -> Result<FailoverRecordResponse, ClientError> {
        self.post(&format!("/api/v1/admin/failover/{id}/retry")).await
    }

    /// `GET /api/v1/admin/logs` – filtered operation log.
    pub async fn logs(&self, query: &LogQuery) -> Result<Vec<LogEntryResponse>, ClientError> {
        let url = self.base_url.join("/api/v1/admin/logs")?;
        let resp = self
            .http
            .get(url)
            .header(ADMIN_AUTH_HEADER, &self.admin_secret)
            .query(query)
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/admin/logs/summary`
    pub async fn log_summary(&self) -> Result<LogSummaryResponse, ClientError> {
        self.get("/api/v1/admin/logs/summary").await
    }

    /// `POST /api/v1/admin/tasks/{task}` – run a scheduled task now.
    pub async fn trigger_task(&self, task: ScheduledTask) -> Result<TaskRunResponse, ClientError> {
        self.post(&format!("/api/v1/admin/tasks/{task}")).await
    }

    /// `GET /api/v1/admin/reports/reconciliation`
    pub async fn reconciliation_report(
        &self,
    ) -> Result<ReconciliationReportResponse, ClientError> {
        self.get("/api/v1/admin/reports/reconciliation").await
    }

    /// `GET /api/v1/admin/transactions/{transaction_id}/integrity`
    pub async fn transaction_integrity(
        &self,
        transaction_id: Uuid,
    ) -> Result<IntegrityCheckResponse, ClientError> {
        self.get(&format!(
            "/api/v1/admin/transactions/{transaction_id}/integrity"
        ))
        .await
    }

    /// `GET /api/v1/admin/reports/payout-integrity`
    pub async fn payout_integrity_report(
        &self,
    ) -> Result<PayoutIntegrityReportResponse, ClientError> {
        self.get("/api/v1/admin/reports/payout-integrity").await
    }

    /// `POST /api/v1/admin/creators/{creator_id}/elite-founding`
    pub async fn grant_elite_founding(
        &self,
        creator_id: Uuid,
    ) -> Result<ConnectedAccountResponse, ClientError> {
        self.post(&format!(
            "/api/v1/admin/creators/{creator_id}/elite-founding"
        ))
        .await
    }

    /// `GET /api/v1/admin/creators/{creator_id}/fee-profile`
    pub async fn fee_profile(&self, creator_id: Uuid) -> Result<FeeProfileResponse, ClientError> {
        self.get(&format!("/api/v1/admin/creators/{creator_id}/fee-profile"))
            .await
    }
}
