//! Daily price configuration handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::Tenant;
use crate::services::price::{PriceQuery, PriceService, PriceSheet, SetPricesInput};
use crate::AppState;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub crop: Option<String>,
}

/// Price sheet in force on a day
pub async fn get_prices(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(query): Query<PriceQuery>,
) -> AppResult<Json<PriceSheet>> {
    tenant.user.require(Resource::Price, Action::View)?;
    let sheet = PriceService::new(state.db.clone())
        .get_sheet(tenant.cooperative_id, &state.config.payments.currency, &query)
        .await?;
    Ok(Json(sheet))
}

pub async fn get_price_history(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<serde_json::Value>> {
    tenant.user.require(Resource::Price, Action::View)?;
    let prices = PriceService::new(state.db.clone())
        .get_history(tenant.cooperative_id, query.crop.as_deref())
        .await?;
    Ok(Json(serde_json::json!({ "prices": prices })))
}

/// Set a day's prices
pub async fn set_prices(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(input): Json<SetPricesInput>,
) -> AppResult<Json<PriceSheet>> {
    tenant.user.require(Resource::Price, Action::Edit)?;
    let sheet = PriceService::new(state.db.clone())
        .set_prices(
            tenant.cooperative_id,
            tenant.user.user_id,
            &state.config.payments.currency,
            input,
        )
        .await?;
    Ok(Json(sheet))
}
