use axum::{
    Json,
    extract::{Path, State},
};
use fanpay_sdk::objects::{ConnectedAccountResponse, FeeProfileResponse};
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /creators/{creator_id}/elite-founding`: permanent 10% platform fee.
pub async fn grant_elite_founding(
    State(state): State<AppState>,
    AdminAuth(principal): AdminAuth,
    Path(creator_id): Path<Uuid>,
) -> Result<Json<ConnectedAccountResponse>, AdminApiError> {
    let console = state.engine.operator(&principal)?;
    let account = console.grant_elite_founding(creator_id).await?;
    Ok(Json(account.into()))
}

pub async fn fee_profile(
    State(state): State<AppState>,
    AdminAuth(principal): AdminAuth,
    Path(creator_id): Path<Uuid>,
) -> Result<Json<FeeProfileResponse>, AdminApiError> {
    let console = state.engine.operator(&principal)?;
    let profile = console.fee_profile(creator_id).await?;
    Ok(Json(profile.into()))
}
