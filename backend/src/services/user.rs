//! User management service for staff accounts inside a cooperative

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::UserRole;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::auth::hash_password;

/// User service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

/// User account as returned by the API
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub cooperative_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub phone: Option<String>,
}

/// Input for updating a user
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

const USER_COLUMNS: &str =
    "id, cooperative_id, email, name, phone, role, is_active, last_login_at, created_at, updated_at";

impl UserService {
    /// Create a new UserService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List users of a cooperative
    pub async fn list_users(&self, cooperative_id: Uuid) -> AppResult<Vec<UserAccount>> {
        let users = sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {} FROM users WHERE cooperative_id = $1 ORDER BY role, name",
            USER_COLUMNS
        ))
        .bind(cooperative_id)
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    /// Get a user of a cooperative
    pub async fn get_user(&self, cooperative_id: Uuid, user_id: Uuid) -> AppResult<UserAccount> {
        sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {} FROM users WHERE id = $1 AND cooperative_id = $2",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(cooperative_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Create a staff user in a cooperative
    pub async fn create_user(
        &self,
        actor: &AuthUser,
        cooperative_id: Uuid,
        input: CreateUserInput,
    ) -> AppResult<UserAccount> {
        Self::check_role_assignment(actor, input.role)?;
        Self::check_staff_role(input.role)?;

        let mut tx = self.db.begin().await?;
        let user = Self::insert_user(&mut tx, cooperative_id, input).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = %user.role, %cooperative_id, "user created");
        Ok(user)
    }

    /// Update a user
    pub async fn update_user(
        &self,
        actor: &AuthUser,
        cooperative_id: Uuid,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> AppResult<UserAccount> {
        input.validate()?;
        let existing = self.get_user(cooperative_id, user_id).await?;

        if let Some(phone) = input.phone.as_deref() {
            shared::validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }

        let existing_role = UserRole::parse(&existing.role)
            .ok_or_else(|| AppError::Internal(format!("Unknown role {}", existing.role)))?;
        Self::check_role_assignment(actor, existing_role)?;

        if let Some(role) = input.role {
            Self::check_role_assignment(actor, role)?;
            let involves_farmer = existing_role == UserRole::Farmer || role == UserRole::Farmer;
            if involves_farmer && role != existing_role {
                return Err(AppError::validation(
                    "role",
                    "Farmer accounts are managed through farmer registration",
                ));
            }
        }

        if input.is_active == Some(false) && user_id == actor.user_id {
            return Err(AppError::validation("is_active", "You cannot deactivate your own account"));
        }

        let user = sqlx::query_as::<_, UserAccount>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                phone = COALESCE($2, phone),
                role = COALESCE($3, role),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $5 AND cooperative_id = $6
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.phone)
        .bind(input.role.map(|r| r.as_str()))
        .bind(input.is_active)
        .bind(user_id)
        .bind(cooperative_id)
        .fetch_one(&self.db)
        .await?;

        if input.is_active == Some(false) {
            Self::revoke_sessions(&self.db, user_id).await?;
        }

        Ok(user)
    }

    /// Deactivate a user (accounts are never hard-deleted)
    pub async fn deactivate_user(&self, actor: &AuthUser, cooperative_id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.update_user(
            actor,
            cooperative_id,
            user_id,
            UpdateUserInput {
                name: None,
                phone: None,
                role: None,
                is_active: Some(false),
            },
        )
        .await?;
        tracing::info!(%user_id, %cooperative_id, "user deactivated");
        Ok(())
    }

    /// Insert a user inside an open transaction.
    ///
    /// Shared with cooperative onboarding and farmer registration.
    pub(crate) async fn insert_user(
        tx: &mut Transaction<'_, Postgres>,
        cooperative_id: Uuid,
        input: CreateUserInput,
    ) -> AppResult<UserAccount> {
        input.validate()?;
        shared::validate_password(&input.password).map_err(|m| AppError::validation("password", m))?;
        if let Some(phone) = input.phone.as_deref() {
            shared::validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }
        if !input.role.is_tenant_scoped() {
            return Err(AppError::validation("role", "Super-admins cannot belong to a cooperative"));
        }

        let password_hash = hash_password(&input.password)?;

        sqlx::query_as::<_, UserAccount>(&format!(
            r#"
            INSERT INTO users (cooperative_id, email, name, phone, role, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(cooperative_id)
        .bind(input.email.trim())
        .bind(input.name.trim())
        .bind(&input.phone)
        .bind(input.role.as_str())
        .bind(&password_hash)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "email"))
    }

    async fn revoke_sessions(db: &PgPool, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL")
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Farmer logins only exist linked to a farmer record
    fn check_staff_role(role: UserRole) -> AppResult<()> {
        if role == UserRole::Farmer {
            return Err(AppError::validation(
                "role",
                "Farmer accounts are managed through farmer registration",
            ));
        }
        Ok(())
    }

    fn check_role_assignment(actor: &AuthUser, role: UserRole) -> AppResult<()> {
        if actor.role.can_manage(role) {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: UserRole) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
            cooperative_id: Some(Uuid::new_v4()),
            farmer_id: None,
            permissions: shared::permissions_for(role),
        }
    }

    #[test]
    fn test_role_assignment_rules() {
        assert!(UserService::check_role_assignment(&actor(UserRole::CoopAdmin), UserRole::Inspector).is_ok());
        assert!(UserService::check_role_assignment(&actor(UserRole::CoopAdmin), UserRole::SuperAdmin).is_err());
        assert!(UserService::check_role_assignment(&actor(UserRole::FinanceOfficer), UserRole::Clerk).is_err());
    }

    #[test]
    fn test_farmer_logins_not_created_as_staff() {
        // a coop admin may manage farmer accounts but not mint unlinked ones
        assert!(UserService::check_role_assignment(&actor(UserRole::CoopAdmin), UserRole::Farmer).is_ok());
        let err = UserService::check_staff_role(UserRole::Farmer).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "role"));
        for role in [UserRole::CoopAdmin, UserRole::Clerk, UserRole::Inspector, UserRole::FinanceOfficer] {
            assert!(UserService::check_staff_role(role).is_ok());
        }
    }

    #[test]
    fn test_create_input_validation() {
        let input = CreateUserInput {
            name: "".to_string(),
            email: "not-an-email".to_string(),
            password: "secret123".to_string(),
            role: UserRole::Clerk,
            phone: None,
        };
        let err: AppError = input.validate().unwrap_err().into();
        // fields are reported in name order
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "email"));
    }
}
