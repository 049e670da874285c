//! Farmer registration handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::Tenant;
use crate::services::farmer::{Farmer, FarmerDetail, FarmerFilter, FarmerService, RegisterFarmerInput, UpdateFarmerInput};
use crate::AppState;

/// List farmers of the cooperative
pub async fn list_farmers(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(filter): Query<FarmerFilter>,
) -> AppResult<Json<serde_json::Value>> {
    tenant.user.require(Resource::Farmer, Action::View)?;
    let farmers = FarmerService::new(state.db.clone())
        .list_farmers(tenant.cooperative_id, &filter)
        .await?;
    Ok(Json(serde_json::json!({ "farmers": farmers })))
}

/// Get a farmer with totals
pub async fn get_farmer(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(farmer_id): Path<Uuid>,
) -> AppResult<Json<FarmerDetail>> {
    tenant.user.require(Resource::Farmer, Action::View)?;
    let farmer = FarmerService::new(state.db.clone())
        .get_farmer_detail(tenant.cooperative_id, farmer_id)
        .await?;
    Ok(Json(farmer))
}

/// Register a farmer
pub async fn register_farmer(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(input): Json<RegisterFarmerInput>,
) -> AppResult<(StatusCode, Json<Farmer>)> {
    tenant.user.require(Resource::Farmer, Action::Create)?;
    let farmer = FarmerService::new(state.db.clone())
        .register_farmer(tenant.cooperative_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(farmer)))
}

/// Update a farmer
pub async fn update_farmer(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(farmer_id): Path<Uuid>,
    Json(input): Json<UpdateFarmerInput>,
) -> AppResult<Json<Farmer>> {
    tenant.user.require(Resource::Farmer, Action::Edit)?;
    let farmer = FarmerService::new(state.db.clone())
        .update_farmer(tenant.cooperative_id, farmer_id, input)
        .await?;
    Ok(Json(farmer))
}

/// Deactivate a farmer
pub async fn delete_farmer(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(farmer_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    tenant.user.require(Resource::Farmer, Action::Delete)?;
    FarmerService::new(state.db.clone())
        .deactivate_farmer(tenant.cooperative_id, farmer_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
