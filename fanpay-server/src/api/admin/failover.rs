use axum::{
    Json,
    extract::{Path, State},
};
use fanpay_sdk::objects::{FailoverQueueStatus, FailoverRecordResponse};
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /failover`: counts per backup status and the oldest pending record.
pub async fn status(
    State(state): State<AppState>,
    AdminAuth(principal): AdminAuth,
) -> Result<Json<FailoverQueueStatus>, AdminApiError> {
    let console = state.engine.operator(&principal)?;
    Ok(Json(console.failover_status()))
}

pub async fn creator_records(
    State(state): State<AppState>,
    AdminAuth(principal): AdminAuth,
    Path(creator_id): Path<Uuid>,
) -> Result<Json<Vec<FailoverRecordResponse>>, AdminApiError> {
    let console = state.engine.operator(&principal)?;
    let records = console.creator_failover_records(creator_id);
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// `POST /failover/{id}/retry`: run one record's retry immediately.
///
/// A retry that fails again answers `retry_exhausted`; the record keeps its
/// updated state either way.
pub async fn retry(
    State(state): State<AppState>,
    AdminAuth(principal): AdminAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<FailoverRecordResponse>, AdminApiError> {
    let console = state.engine.operator(&principal)?;
    let record = console.retry_failover(id).await?;
    Ok(Json(record.into()))
}
