//! Authentication middleware
//!
//! JWT authentication, role-based access control and tenant resolution

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use shared::{permission_key, Action, Resource, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::auth::decode_claims;
use crate::services::CooperativeService;
use crate::AppState;

/// Header super-admins use to pick the cooperative a request acts on
pub const TENANT_HEADER: &str = "x-cooperative-id";

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub cooperative_id: Option<Uuid>,
    pub farmer_id: Option<Uuid>,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        let permission = permission_key(resource, action);
        self.permissions.contains(&permission)
    }

    /// Check if user has any of the specified permissions
    pub fn has_any_permission(&self, perms: &[(Resource, Action)]) -> bool {
        perms.iter().any(|(r, a)| self.has_permission(*r, *a))
    }

    /// Fail with 403 unless the user holds `resource:action`
    pub fn require(&self, resource: Resource, action: Action) -> AppResult<()> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.user_id,
                role = %self.role,
                permission = %permission_key(resource, action),
                "permission denied"
            );
            Err(AppError::InsufficientPermissions)
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == UserRole::SuperAdmin
    }

    /// The cooperative this request acts on.
    ///
    /// Tenant users are pinned to their own cooperative; super-admins must name one.
    pub fn resolve_tenant(&self, requested: Option<Uuid>) -> AppResult<Uuid> {
        match (self.role, self.cooperative_id, requested) {
            (UserRole::SuperAdmin, _, Some(id)) => Ok(id),
            (UserRole::SuperAdmin, _, None) => Err(AppError::TenantRequired),
            (_, Some(own), None) => Ok(own),
            (_, Some(own), Some(id)) if id == own => Ok(own),
            (_, Some(_), Some(_)) => Err(AppError::InsufficientPermissions),
            (_, None, _) => Err(AppError::Unauthorized(
                "Account is not attached to a cooperative".to_string(),
            )),
        }
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid Authorization header".to_string()))?;

    let claims = decode_claims(token, &state.config.jwt.secret)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
    let role = UserRole::parse(&claims.role).ok_or(AppError::InvalidToken)?;

    let auth_user = AuthUser {
        user_id,
        role,
        cooperative_id: claims.cooperative_id,
        farmer_id: claims.farmer_id,
        permissions: claims.permissions,
    };

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Read the optional tenant header
fn requested_tenant(headers: &HeaderMap) -> AppResult<Option<Uuid>> {
    headers
        .get(TENANT_HEADER)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|s| Uuid::parse_str(s.trim()).ok())
                .ok_or_else(|| AppError::validation(TENANT_HEADER, "Cooperative id must be a UUID"))
        })
        .transpose()
}

/// Resolve the tenant. A super-admin's header choice must name an existing cooperative.
async fn existing_tenant(db: &PgPool, user: &AuthUser, requested: Option<Uuid>) -> AppResult<Uuid> {
    let cooperative_id = user.resolve_tenant(requested)?;
    if user.is_super_admin() {
        CooperativeService::ensure_exists(db, cooperative_id).await?;
    }
    Ok(cooperative_id)
}

/// The authenticated user together with the cooperative the request acts on
#[derive(Clone, Debug)]
pub struct Tenant {
    pub user: AuthUser,
    pub cooperative_id: Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Tenant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        let cooperative_id = existing_tenant(&state.db, &user, requested_tenant(&parts.headers)?).await?;
        Ok(Tenant { user, cooperative_id })
    }
}

/// Like [`Tenant`], but a super-admin without the header gets `None`
#[derive(Clone, Debug)]
pub struct OptionalTenant {
    pub user: AuthUser,
    pub cooperative_id: Option<Uuid>,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for OptionalTenant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        let requested = requested_tenant(&parts.headers)?;
        let cooperative_id = if user.is_super_admin() && requested.is_none() {
            None
        } else {
            Some(existing_tenant(&state.db, &user, requested).await?)
        };
        Ok(OptionalTenant { user, cooperative_id })
    }
}
