//! Harvest recording and inspection HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::Tenant;
use crate::services::harvest::{
    Harvest, HarvestFilter, HarvestService, RecordHarvestInput, UpdateHarvestInput, VerifyHarvestInput,
};
use crate::AppState;

/// List harvests of the cooperative
pub async fn list_harvests(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(filter): Query<HarvestFilter>,
) -> AppResult<Json<serde_json::Value>> {
    tenant.user.require(Resource::Harvest, Action::View)?;
    let harvests = HarvestService::new(state.db.clone())
        .get_harvests(tenant.cooperative_id, &filter)
        .await?;
    Ok(Json(serde_json::json!({ "harvests": harvests })))
}

/// Get a specific harvest
pub async fn get_harvest(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(harvest_id): Path<Uuid>,
) -> AppResult<Json<Harvest>> {
    tenant.user.require(Resource::Harvest, Action::View)?;
    let harvest = HarvestService::new(state.db.clone())
        .get_harvest(tenant.cooperative_id, harvest_id)
        .await?;
    Ok(Json(harvest))
}

/// Record a new harvest
pub async fn record_harvest(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(input): Json<RecordHarvestInput>,
) -> AppResult<(StatusCode, Json<Harvest>)> {
    tenant.user.require(Resource::Harvest, Action::Create)?;
    let harvest = HarvestService::new(state.db.clone())
        .record_harvest(tenant.cooperative_id, tenant.user.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(harvest)))
}

/// Update a harvest
pub async fn update_harvest(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(harvest_id): Path<Uuid>,
    Json(input): Json<UpdateHarvestInput>,
) -> AppResult<Json<Harvest>> {
    tenant.user.require(Resource::Harvest, Action::Edit)?;
    let harvest = HarvestService::new(state.db.clone())
        .update_harvest(tenant.cooperative_id, harvest_id, input)
        .await?;
    Ok(Json(harvest))
}

/// Delete a harvest
pub async fn delete_harvest(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(harvest_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    tenant.user.require(Resource::Harvest, Action::Delete)?;
    HarvestService::new(state.db.clone())
        .delete_harvest(tenant.cooperative_id, harvest_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Record the quality inspection of a harvest
pub async fn verify_harvest(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(harvest_id): Path<Uuid>,
    Json(input): Json<VerifyHarvestInput>,
) -> AppResult<Json<Harvest>> {
    tenant.user.require(Resource::Harvest, Action::Verify)?;
    let harvest = HarvestService::new(state.db.clone())
        .verify_harvest(tenant.cooperative_id, harvest_id, tenant.user.user_id, input)
        .await?;
    Ok(Json(harvest))
}
