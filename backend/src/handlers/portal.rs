//! Farmer self-service portal: a farmer's own records, identified by the token

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{Action, DateRange, Resource};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, CurrentUser};
use crate::services::farmer::{FarmerDetail, FarmerService};
use crate::services::harvest::{HarvestFilter, HarvestService};
use crate::services::payment::{PaymentFilter, PaymentService};
use crate::services::price::{PriceQuery, PriceService, PriceSheet};
use crate::AppState;

#[derive(Deserialize)]
pub struct PortalHarvestQuery {
    pub from: Option<chrono::NaiveDate>,
    pub to: Option<chrono::NaiveDate>,
}

/// The (cooperative, farmer) pair the signed-in farmer may see
fn portal_identity(user: &AuthUser) -> AppResult<(Uuid, Uuid)> {
    user.require(Resource::Portal, Action::View)?;
    match (user.cooperative_id, user.farmer_id) {
        (Some(cooperative_id), Some(farmer_id)) => Ok((cooperative_id, farmer_id)),
        _ => Err(AppError::Unauthorized("Account is not linked to a farmer".to_string())),
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<FarmerDetail>> {
    let (cooperative_id, farmer_id) = portal_identity(&user)?;
    let farmer = FarmerService::new(state.db.clone())
        .get_farmer_detail(cooperative_id, farmer_id)
        .await?;
    Ok(Json(farmer))
}

pub async fn get_my_harvests(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PortalHarvestQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let (cooperative_id, farmer_id) = portal_identity(&user)?;
    if !DateRange::from_bounds(query.from, query.to).is_valid() {
        return Err(AppError::validation("from", "Start date must not be after end date"));
    }

    let filter = HarvestFilter {
        farmer_id: Some(farmer_id),
        from: query.from,
        to: query.to,
        ..Default::default()
    };
    let harvests = HarvestService::new(state.db.clone())
        .get_harvests(cooperative_id, &filter)
        .await?;
    Ok(Json(serde_json::json!({ "harvests": harvests })))
}

pub async fn get_my_payments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let (cooperative_id, farmer_id) = portal_identity(&user)?;
    let filter = PaymentFilter {
        status: None,
        farmer_id: Some(farmer_id),
    };
    let payments = PaymentService::new(state.db.clone(), state.config.payments.currency.clone())
        .list_payments(cooperative_id, &filter)
        .await?;
    Ok(Json(serde_json::json!({ "payments": payments })))
}

/// Today's prices of the farmer's cooperative
pub async fn get_current_prices(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<PriceSheet>> {
    let (cooperative_id, _) = portal_identity(&user)?;
    let sheet = PriceService::new(state.db.clone())
        .get_sheet(cooperative_id, &state.config.payments.currency, &PriceQuery::default())
        .await?;
    Ok(Json(sheet))
}
