//! Cooperative (tenant) administration handlers, super-admin only

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::cooperative::{
    Cooperative, CooperativeService, CreateCooperativeInput, CreatedCooperative, UpdateCooperativeInput,
};
use crate::AppState;

/// List all cooperatives
pub async fn list_cooperatives(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    user.require(Resource::Cooperative, Action::View)?;
    let cooperatives = CooperativeService::new(state.db.clone()).list_cooperatives().await?;
    Ok(Json(serde_json::json!({ "cooperatives": cooperatives })))
}

/// Get a cooperative
pub async fn get_cooperative(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cooperative_id): Path<Uuid>,
) -> AppResult<Json<Cooperative>> {
    user.require(Resource::Cooperative, Action::View)?;
    let cooperative = CooperativeService::new(state.db.clone())
        .get_cooperative(cooperative_id)
        .await?;
    Ok(Json(cooperative))
}

/// Onboard a cooperative with its first administrator
pub async fn create_cooperative(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateCooperativeInput>,
) -> AppResult<(StatusCode, Json<CreatedCooperative>)> {
    user.require(Resource::Cooperative, Action::Create)?;
    let created = CooperativeService::new(state.db.clone()).create_cooperative(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update cooperative details
pub async fn update_cooperative(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cooperative_id): Path<Uuid>,
    Json(input): Json<UpdateCooperativeInput>,
) -> AppResult<Json<Cooperative>> {
    user.require(Resource::Cooperative, Action::Edit)?;
    let cooperative = CooperativeService::new(state.db.clone())
        .update_cooperative(cooperative_id, input)
        .await?;
    Ok(Json(cooperative))
}

pub async fn activate_cooperative(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cooperative_id): Path<Uuid>,
) -> AppResult<Json<Cooperative>> {
    user.require(Resource::Cooperative, Action::Edit)?;
    let cooperative = CooperativeService::new(state.db.clone())
        .set_active(cooperative_id, true)
        .await?;
    Ok(Json(cooperative))
}

pub async fn deactivate_cooperative(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(cooperative_id): Path<Uuid>,
) -> AppResult<Json<Cooperative>> {
    user.require(Resource::Cooperative, Action::Delete)?;
    let cooperative = CooperativeService::new(state.db.clone())
        .set_active(cooperative_id, false)
        .await?;
    Ok(Json(cooperative))
}
