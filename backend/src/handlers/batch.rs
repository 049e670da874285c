//! Batch handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::Tenant;
use crate::services::batch::{
    AddHarvestsInput, Batch, BatchDetail, BatchFilter, BatchService, CreateBatchInput, DispatchBatchInput,
};
use crate::AppState;

pub async fn list_batches(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(filter): Query<BatchFilter>,
) -> AppResult<Json<serde_json::Value>> {
    tenant.user.require(Resource::Batch, Action::View)?;
    let batches = BatchService::new(state.db.clone())
        .list_batches(tenant.cooperative_id, &filter)
        .await?;
    Ok(Json(serde_json::json!({ "batches": batches })))
}

pub async fn get_batch(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<BatchDetail>> {
    tenant.user.require(Resource::Batch, Action::View)?;
    let batch = BatchService::new(state.db.clone())
        .get_batch_detail(tenant.cooperative_id, batch_id)
        .await?;
    Ok(Json(batch))
}

/// Create a batch from verified harvests
pub async fn create_batch(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<(StatusCode, Json<BatchDetail>)> {
    tenant.user.require(Resource::Batch, Action::Create)?;
    let batch = BatchService::new(state.db.clone())
        .create_batch(tenant.cooperative_id, tenant.user.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

pub async fn add_batch_harvests(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<AddHarvestsInput>,
) -> AppResult<Json<BatchDetail>> {
    tenant.user.require(Resource::Batch, Action::Edit)?;
    let batch = BatchService::new(state.db.clone())
        .add_harvests(tenant.cooperative_id, batch_id, input)
        .await?;
    Ok(Json(batch))
}

pub async fn remove_batch_harvest(
    State(state): State<AppState>,
    tenant: Tenant,
    Path((batch_id, harvest_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<BatchDetail>> {
    tenant.user.require(Resource::Batch, Action::Edit)?;
    let batch = BatchService::new(state.db.clone())
        .remove_harvest(tenant.cooperative_id, batch_id, harvest_id)
        .await?;
    Ok(Json(batch))
}

pub async fn close_batch(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<Batch>> {
    tenant.user.require(Resource::Batch, Action::Edit)?;
    let batch = BatchService::new(state.db.clone())
        .close_batch(tenant.cooperative_id, batch_id)
        .await?;
    Ok(Json(batch))
}

pub async fn dispatch_batch(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<DispatchBatchInput>,
) -> AppResult<Json<Batch>> {
    tenant.user.require(Resource::Batch, Action::Edit)?;
    let batch = BatchService::new(state.db.clone())
        .dispatch_batch(tenant.cooperative_id, batch_id, input)
        .await?;
    Ok(Json(batch))
}
