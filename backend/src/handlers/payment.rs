//! Payment processing handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::Tenant;
use crate::services::payment::{
    PayInput, Payment, PaymentDetail, PaymentFilter, PaymentRunInput, PaymentRunPreview, PaymentService,
};
use crate::AppState;

fn service(state: &AppState) -> PaymentService {
    PaymentService::new(state.db.clone(), state.config.payments.currency.clone())
}

/// Preview what a payment run would pay, without saving
pub async fn preview_payments(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(input): Json<PaymentRunInput>,
) -> AppResult<Json<PaymentRunPreview>> {
    tenant.user.require(Resource::Payment, Action::Create)?;
    let preview = service(&state).preview(tenant.cooperative_id, &input).await?;
    Ok(Json(preview))
}

/// Generate pending payments for the period
pub async fn generate_payments(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(input): Json<PaymentRunInput>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    tenant.user.require(Resource::Payment, Action::Create)?;
    let payments = service(&state)
        .generate(tenant.cooperative_id, tenant.user.user_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "payments": payments }))))
}

pub async fn list_payments(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(filter): Query<PaymentFilter>,
) -> AppResult<Json<serde_json::Value>> {
    tenant.user.require(Resource::Payment, Action::View)?;
    let payments = service(&state).list_payments(tenant.cooperative_id, &filter).await?;
    Ok(Json(serde_json::json!({ "payments": payments })))
}

pub async fn get_payment(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<PaymentDetail>> {
    tenant.user.require(Resource::Payment, Action::View)?;
    let payment = service(&state)
        .get_payment_detail(tenant.cooperative_id, payment_id)
        .await?;
    Ok(Json(payment))
}

pub async fn approve_payment(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<Payment>> {
    tenant.user.require(Resource::Payment, Action::Approve)?;
    let payment = service(&state)
        .approve(tenant.cooperative_id, payment_id, tenant.user.user_id)
        .await?;
    Ok(Json(payment))
}

/// Record the payout of an approved payment
pub async fn pay_payment(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(payment_id): Path<Uuid>,
    Json(input): Json<PayInput>,
) -> AppResult<Json<Payment>> {
    tenant.user.require(Resource::Payment, Action::Pay)?;
    let payment = service(&state).pay(tenant.cooperative_id, payment_id, input).await?;
    Ok(Json(payment))
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<Payment>> {
    tenant.user.require(Resource::Payment, Action::Approve)?;
    let payment = service(&state).cancel(tenant.cooperative_id, payment_id).await?;
    Ok(Json(payment))
}
