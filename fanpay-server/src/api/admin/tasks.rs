use axum::{
    Json,
    extract::{Path, State},
};
use fanpay_sdk::objects::{ScheduledTask, TaskRunResponse};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /tasks/{task}`: run a scheduled task now and wait for it.
///
/// A task already running answers with outcome `skipped`.
pub async fn trigger(
    State(state): State<AppState>,
    AdminAuth(principal): AdminAuth,
    Path(task): Path<ScheduledTask>,
) -> Result<Json<TaskRunResponse>, AdminApiError> {
    let console = state.engine.operator(&principal)?;
    Ok(Json(console.trigger_task(task).await))
}
