//! Staff user management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::Tenant;
use crate::services::user::{CreateUserInput, UpdateUserInput, UserAccount, UserService};
use crate::AppState;

/// List users of the cooperative
pub async fn list_users(State(state): State<AppState>, tenant: Tenant) -> AppResult<Json<serde_json::Value>> {
    tenant.user.require(Resource::User, Action::View)?;
    let users = UserService::new(state.db.clone()).list_users(tenant.cooperative_id).await?;
    Ok(Json(serde_json::json!({ "users": users })))
}

/// Get a user
pub async fn get_user(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserAccount>> {
    tenant.user.require(Resource::User, Action::View)?;
    let user = UserService::new(state.db.clone())
        .get_user(tenant.cooperative_id, user_id)
        .await?;
    Ok(Json(user))
}

/// Create a user
pub async fn create_user(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<UserAccount>)> {
    tenant.user.require(Resource::User, Action::Create)?;
    let user = UserService::new(state.db.clone())
        .create_user(&tenant.user, tenant.cooperative_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Update a user
pub async fn update_user(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<UserAccount>> {
    tenant.user.require(Resource::User, Action::Edit)?;
    let user = UserService::new(state.db.clone())
        .update_user(&tenant.user, tenant.cooperative_id, user_id, input)
        .await?;
    Ok(Json(user))
}

/// Deactivate a user
pub async fn delete_user(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    tenant.user.require(Resource::User, Action::Delete)?;
    UserService::new(state.db.clone())
        .deactivate_user(&tenant.user, tenant.cooperative_id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
