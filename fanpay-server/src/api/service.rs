//! Service API handlers.
//!
//! These endpoints are called by the platform backend and require
//! a signed body verified via the `Fanpay-Signature` header.
//!
//! # Endpoints
//!
//! - `POST /payments`                  – confirm and apply a payment
//! - `POST /payouts`                   – transfer earnings to a creator
//! - `POST /payouts/status`            – refreshed status of one payout
//! - `POST /creators/payouts`          – payout history of a creator
//! - `POST /creators/balance`          – earnings and available balance
//! - `POST /creators/onboard`          – create a connected account
//! - `POST /creators/onboarding-link`  – hosted onboarding link
//! - `POST /transactions/refund`       – refund a completed transaction

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use fanpay_core::EngineError;
use fanpay_sdk::objects::{
    BalanceResponse, ConnectedAccountResponse, CreatorRequest, GetPayoutRequest,
    InitiatePayoutRequest, OnboardCreatorRequest, OnboardingLinkRequest, OnboardingLinkResponse,
    PaymentResult, PayoutResponse, ProcessPaymentRequest, RefundRequest, TransactionResponse,
};

use crate::api::engine_error_response;
use crate::api::extractors::SignedBody;
use crate::state::AppState;

/// Build the Service API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments", post(process_payment))
        .route("/payouts", post(initiate_payout))
        .route("/payouts/status", post(get_payout_status))
        .route("/creators/payouts", post(get_payout_history))
        .route("/creators/balance", post(get_balance))
        .route("/creators/onboard", post(onboard_creator))
        .route("/creators/onboarding-link", post(create_onboarding_link))
        .route("/transactions/refund", post(refund_transaction))
}

/// `POST /payments`: confirm the gateway intent and apply the payment.
///
/// Rejections carry a `PaymentResult` with `success = false` so the caller
/// always reads the same shape.
async fn process_payment(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<ProcessPaymentRequest>,
) -> Response {
    match state.engine.payments().process_payment(payload.into()).await {
        Ok(receipt) => {
            let status = if receipt.replayed {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (status, Json(PaymentResult::from(receipt))).into_response()
        }
        Err(e) => {
            let status = crate::api::status_for(e.code());
            if status.is_server_error() {
                tracing::error!(error = %e.detail(), "Payment processing failed");
            }
            (status, Json(PaymentResult::failed(e.to_body()))).into_response()
        }
    }
}

async fn initiate_payout(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<InitiatePayoutRequest>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let payout = state
        .engine
        .payouts()
        .initiate_payout(payload.creator_id, payload.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(PayoutResponse::from(payout))))
}

async fn get_payout_status(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<GetPayoutRequest>,
) -> Result<Json<PayoutResponse>, ServiceApiError> {
    let payout = state
        .engine
        .payouts()
        .get_payout_status(payload.payout_id)
        .await?;
    Ok(Json(payout.into()))
}

async fn get_payout_history(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<CreatorRequest>,
) -> Result<Json<Vec<PayoutResponse>>, ServiceApiError> {
    let history = state
        .engine
        .payouts()
        .get_payout_history(payload.creator_id)
        .await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}

async fn get_balance(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<CreatorRequest>,
) -> Result<Json<BalanceResponse>, ServiceApiError> {
    let balance = state.engine.ledger().get_balance(payload.creator_id).await?;
    Ok(Json(balance.into()))
}

async fn onboard_creator(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<OnboardCreatorRequest>,
) -> Result<Json<ConnectedAccountResponse>, ServiceApiError> {
    let account = state
        .engine
        .accounts()
        .onboard_creator(payload.creator_id, &payload.email, &payload.country)
        .await?;
    Ok(Json(account.into()))
}

async fn create_onboarding_link(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<OnboardingLinkRequest>,
) -> Result<Json<OnboardingLinkResponse>, ServiceApiError> {
    let link = state
        .engine
        .accounts()
        .create_onboarding_link(payload.creator_id, &payload.refresh_url, &payload.return_url)
        .await?;
    Ok(Json(OnboardingLinkResponse {
        url: link.url,
        expires_at: link.expires_at,
    }))
}

async fn refund_transaction(
    State(state): State<AppState>,
    SignedBody(payload): SignedBody<RefundRequest>,
) -> Result<Json<TransactionResponse>, ServiceApiError> {
    let transaction = state.engine.ledger().refund(payload.transaction_id).await?;
    Ok(Json(transaction.into()))
}

/// Errors that can occur in Service API handlers.
#[derive(Debug)]
pub(crate) struct ServiceApiError(EngineError);

impl From<EngineError> for ServiceApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ServiceApiError {
    fn into_response(self) -> Response {
        engine_error_response("service", &self.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{SERVICE_SECRET, body_json, test_app};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use fanpay_sdk::objects::{CreatorRequest, ErrorCode, ProcessPaymentRequest, RefundRequest};
    use fanpay_sdk::signature::{SIGNATURE_HEADER, Signature, SignedObject};
    use serde::Serialize;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn signed_request<T: Signature + Serialize>(path: &str, body: T, key: &[u8]) -> Request<Body> {
        let signed = SignedObject::new(body, key).unwrap();
        Request::builder()
            .method("POST")
            .uri(format!("/api/v1/service{path}"))
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(Body::from(signed.json))
            .unwrap()
    }

    #[tokio::test]
    async fn balance_of_unknown_creator_is_zero() {
        let (app, _) = test_app();
        let creator_id = Uuid::new_v4();
        let response = app
            .oneshot(signed_request(
                "/creators/balance",
                CreatorRequest { creator_id },
                SERVICE_SECRET,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["payout_balance"], 0);
        assert_eq!(body["available"], 0);
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let (app, _) = test_app();
        let response = app
            .oneshot(signed_request(
                "/creators/balance",
                CreatorRequest {
                    creator_id: Uuid::new_v4(),
                },
                b"some-other-secret-entirely",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["code"], ErrorCode::Unauthorized.as_str());
    }

    #[tokio::test]
    async fn unsigned_request_is_rejected() {
        let (app, _) = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/service/transactions/refund")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&RefundRequest {
                    transaction_id: Uuid::new_v4(),
                })
                .unwrap(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_payment_returns_failed_result() {
        let (app, _) = test_app();
        let request = signed_request(
            "/payments",
            ProcessPaymentRequest {
                payer_id: Uuid::new_v4(),
                beneficiary_id: Some(Uuid::new_v4()),
                amount: 0,
                category: fanpay_sdk::objects::Category::Tip,
                gateway_intent_id: "pi_zero".to_string(),
                description: None,
            },
            SERVICE_SECRET,
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], ErrorCode::InvalidRequest.as_str());
    }

    #[tokio::test]
    async fn refund_of_unknown_transaction_is_not_found() {
        let (app, _) = test_app();
        let response = app
            .oneshot(signed_request(
                "/transactions/refund",
                RefundRequest {
                    transaction_id: Uuid::new_v4(),
                },
                SERVICE_SECRET,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
