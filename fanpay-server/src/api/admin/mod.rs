//! Admin API handlers.
//!
//! These endpoints are called by operators and require the
//! `Fanpay-Admin-Authorization` header with the plaintext admin secret.
//! Every handler goes through the engine's operator console.
//!
//! # Endpoints
//!
//! - `GET  /failover`                               – failover queue status
//! - `GET  /failover/creators/{creator_id}`         – a creator's failover records
//! - `POST /failover/{id}/retry`                    – retry one record now
//! - `GET  /logs`                                   – query the operation log
//! - `GET  /logs/summary`                           – operation log health
//! - `POST /tasks/{task}`                           – run a scheduled task now
//! - `GET  /reports/reconciliation`                 – ledger reconciliation
//! - `GET  /reports/payout-integrity`               – payouts against the gateway
//! - `GET  /transactions/{transaction_id}/integrity` – fee check of one row
//! - `POST /creators/{creator_id}/elite-founding`   – grant Elite Founding
//! - `GET  /creators/{creator_id}/fee-profile`      – effective fee tier

use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use fanpay_core::EngineError;

use crate::api::engine_error_response;
use crate::state::AppState;

mod creators;
mod failover;
mod logs;
mod reports;
mod tasks;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/failover", get(failover::status))
        .route(
            "/failover/creators/{creator_id}",
            get(failover::creator_records),
        )
        .route("/failover/{id}/retry", post(failover::retry))
        .route("/logs", get(logs::query))
        .route("/logs/summary", get(logs::summary))
        .route("/tasks/{task}", post(tasks::trigger))
        .route("/reports/reconciliation", get(reports::reconciliation))
        .route("/reports/payout-integrity", get(reports::payout_integrity))
        .route(
            "/transactions/{transaction_id}/integrity",
            get(reports::transaction_integrity),
        )
        .route(
            "/creators/{creator_id}/elite-founding",
            post(creators::grant_elite_founding),
        )
        .route(
            "/creators/{creator_id}/fee-profile",
            get(creators::fee_profile),
        )
}

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) struct AdminApiError(EngineError);

impl From<EngineError> for AdminApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> Response {
        engine_error_response("admin", &self.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{ADMIN_SECRET, body_json, test_app};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use fanpay_core::entities::{Category, Transaction, TransactionStatus};
    use fanpay_sdk::objects::ErrorCode;
    use fanpay_sdk::signature::ADMIN_AUTH_HEADER;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn admin_request(method: &str, path: &str, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("/api/v1/admin{path}"));
        if let Some(secret) = secret {
            builder = builder.header(ADMIN_AUTH_HEADER, secret);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn missing_admin_header_is_rejected() {
        let (app, _) = test_app();
        let response = app
            .oneshot(admin_request("GET", "/failover", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["code"], ErrorCode::Unauthorized.as_str());
    }

    #[tokio::test]
    async fn wrong_admin_secret_is_rejected() {
        let (app, _) = test_app();
        let response = app
            .oneshot(admin_request("GET", "/logs/summary", Some("guess")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn failover_status_starts_empty() {
        let (app, _) = test_app();
        let response = app
            .oneshot(admin_request("GET", "/failover", Some(ADMIN_SECRET)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 0);
        assert_eq!(body["capacity"], 10_000);
    }

    #[tokio::test]
    async fn retry_of_unknown_record_is_not_found() {
        let (app, _) = test_app();
        let path = format!("/failover/{}/retry", Uuid::new_v4());
        let response = app
            .oneshot(admin_request("POST", &path, Some(ADMIN_SECRET)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn triggered_reconciliation_is_logged_with_operator() {
        let (app, state) = test_app();
        let response = app
            .clone()
            .oneshot(admin_request(
                "POST",
                "/tasks/weekly-reconciliation",
                Some(ADMIN_SECRET),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["outcome"], "completed");

        let response = app
            .oneshot(admin_request(
                "GET",
                "/logs?operation=operator.trigger_task",
                Some(ADMIN_SECRET),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let entries = body_json(response).await;
        assert_eq!(entries.as_array().unwrap().len(), 1);
        assert_eq!(entries[0]["metadata"]["operator"], "operator");
        assert!(state.engine.log().summary().by_severity.info >= 3);
    }

    #[tokio::test]
    async fn transaction_integrity_reports_recorded_rows() {
        let (app, state) = test_app();
        let transaction = Transaction {
            id: Uuid::now_v7(),
            payer_id: Uuid::new_v4(),
            beneficiary_id: Some(Uuid::new_v4()),
            category: Category::Tip,
            amount: 1_000,
            platform_fee: 200,
            status: TransactionStatus::Completed,
            description: "tip".to_string(),
            gateway_intent_id: Some("pi_integrity".to_string()),
            created_at: time::OffsetDateTime::now_utc(),
        };
        state.engine.ledger().record(transaction.clone()).await.unwrap();

        let response = app
            .clone()
            .oneshot(admin_request(
                "GET",
                &format!("/transactions/{}/integrity", transaction.id),
                Some(ADMIN_SECRET),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["passed"], true);
        assert!(body["fault"].is_null());

        let response = app
            .oneshot(admin_request(
                "GET",
                &format!("/transactions/{}/integrity", Uuid::new_v4()),
                Some(ADMIN_SECRET),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_task_is_rejected() {
        let (app, _) = test_app();
        let response = app
            .oneshot(admin_request("POST", "/tasks/hourly-nap", Some(ADMIN_SECRET)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn elite_grant_shows_in_fee_profile() {
        let (app, _) = test_app();
        let creator_id = Uuid::new_v4();
        let response = app
            .clone()
            .oneshot(admin_request(
                "POST",
                &format!("/creators/{creator_id}/elite-founding"),
                Some(ADMIN_SECRET),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["elite_founding"], true);

        let response = app
            .oneshot(admin_request(
                "GET",
                &format!("/creators/{creator_id}/fee-profile"),
                Some(ADMIN_SECRET),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["elite_founding"], true);
        assert_eq!(body["effective_tier"]["platform_percent"], 10);
    }
}
