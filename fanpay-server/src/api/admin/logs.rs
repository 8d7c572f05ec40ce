use axum::{
    Json,
    extract::{Query, State},
};
use fanpay_core::oplog::LogFilter;
use fanpay_sdk::objects::{LogEntryResponse, LogQuery, LogSummaryResponse};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /logs`: newest first, capped at the configured query maximum.
pub async fn query(
    State(state): State<AppState>,
    AdminAuth(principal): AdminAuth,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntryResponse>>, AdminApiError> {
    let console = state.engine.operator(&principal)?;
    let entries = console.logs(&LogFilter::from(query));
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

pub async fn summary(
    State(state): State<AppState>,
    AdminAuth(principal): AdminAuth,
) -> Result<Json<LogSummaryResponse>, AdminApiError> {
    let console = state.engine.operator(&principal)?;
    Ok(Json(console.log_summary().into()))
}
