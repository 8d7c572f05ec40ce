use axum::{
    Json,
    extract::{Path, State},
};
use fanpay_sdk::objects::{
    IntegrityCheckResponse, PayoutIntegrityReportResponse, ReconciliationReportResponse,
};
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

pub async fn reconciliation(
    State(state): State<AppState>,
    AdminAuth(principal): AdminAuth,
) -> Result<Json<ReconciliationReportResponse>, AdminApiError> {
    let console = state.engine.operator(&principal)?;
    let report = console.reconciliation_report().await?;
    Ok(Json(report.into()))
}

/// `GET /transactions/{transaction_id}/integrity`
pub async fn transaction_integrity(
    State(state): State<AppState>,
    AdminAuth(principal): AdminAuth,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<IntegrityCheckResponse>, AdminApiError> {
    let console = state.engine.operator(&principal)?;
    let check = console.transaction_integrity(transaction_id).await?;
    Ok(Json(check.into()))
}

/// `GET /reports/payout-integrity`: compares every submitted payout with
/// the gateway's transfer record.
pub async fn payout_integrity(
    State(state): State<AppState>,
    AdminAuth(principal): AdminAuth,
) -> Result<Json<PayoutIntegrityReportResponse>, AdminApiError> {
    let console = state.engine.operator(&principal)?;
    let report = console.payout_integrity_report().await?;
    Ok(Json(report.into()))
}
