//! Cooperative (tenant) management service, used by super-admins

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CodeKind, UserRole};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::user::{CreateUserInput, UserAccount, UserService};

/// Cooperative service
#[derive(Clone)]
pub struct CooperativeService {
    db: PgPool,
}

/// Cooperative row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Cooperative {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub region: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cooperative with headline counts
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CooperativeSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub cooperative: Cooperative,
    pub user_count: i64,
    pub farmer_count: i64,
}

/// Details of the first administrator of a new cooperative
#[derive(Debug, Deserialize)]
pub struct InitialAdminInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Input for creating a cooperative
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCooperativeInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub code: String,
    pub region: Option<String>,
    pub contact_phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub contact_email: Option<String>,
    pub admin: InitialAdminInput,
}

/// Input for updating a cooperative
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCooperativeInput {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub region: Option<String>,
    pub contact_phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub contact_email: Option<String>,
}

/// Result of onboarding a cooperative
#[derive(Debug, Serialize)]
pub struct CreatedCooperative {
    pub cooperative: Cooperative,
    pub admin: UserAccount,
}

const COOPERATIVE_COLUMNS: &str =
    "id, name, code, region, contact_phone, contact_email, is_active, created_at, updated_at";

impl CooperativeService {
    /// Create a new CooperativeService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// All cooperatives with user and farmer counts
    pub async fn list_cooperatives(&self) -> AppResult<Vec<CooperativeSummary>> {
        let rows = sqlx::query_as::<_, CooperativeSummary>(
            r#"
            SELECT c.id, c.name, c.code, c.region, c.contact_phone, c.contact_email,
                   c.is_active, c.created_at, c.updated_at,
                   (SELECT COUNT(*) FROM users u WHERE u.cooperative_id = c.id) AS user_count,
                   (SELECT COUNT(*) FROM farmers f WHERE f.cooperative_id = c.id) AS farmer_count
            FROM cooperatives c
            ORDER BY c.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Get a cooperative by ID
    pub async fn get_cooperative(&self, cooperative_id: Uuid) -> AppResult<Cooperative> {
        sqlx::query_as::<_, Cooperative>(&format!(
            "SELECT {} FROM cooperatives WHERE id = $1",
            COOPERATIVE_COLUMNS
        ))
        .bind(cooperative_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Cooperative".to_string()))
    }

    /// Create a cooperative together with its first administrator
    pub async fn create_cooperative(&self, input: CreateCooperativeInput) -> AppResult<CreatedCooperative> {
        input.validate()?;
        shared::validate_cooperative_code(&input.code).map_err(|m| AppError::validation("code", m))?;
        if let Some(phone) = input.contact_phone.as_deref() {
            shared::validate_phone(phone).map_err(|m| AppError::validation("contact_phone", m))?;
        }

        let mut tx = self.db.begin().await?;

        let cooperative = sqlx::query_as::<_, Cooperative>(&format!(
            r#"
            INSERT INTO cooperatives (name, code, region, contact_phone, contact_email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            COOPERATIVE_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.code)
        .bind(&input.region)
        .bind(&input.contact_phone)
        .bind(&input.contact_email)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "code"))?;

        let admin = UserService::insert_user(
            &mut tx,
            cooperative.id,
            CreateUserInput {
                name: input.admin.name,
                email: input.admin.email,
                password: input.admin.password,
                role: UserRole::CoopAdmin,
                phone: input.admin.phone,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            cooperative_id = %cooperative.id,
            code = %cooperative.code,
            admin_id = %admin.id,
            "cooperative created"
        );

        Ok(CreatedCooperative { cooperative, admin })
    }

    /// Update cooperative details
    pub async fn update_cooperative(
        &self,
        cooperative_id: Uuid,
        input: UpdateCooperativeInput,
    ) -> AppResult<Cooperative> {
        input.validate()?;
        if let Some(phone) = input.contact_phone.as_deref() {
            shared::validate_phone(phone).map_err(|m| AppError::validation("contact_phone", m))?;
        }

        sqlx::query_as::<_, Cooperative>(&format!(
            r#"
            UPDATE cooperatives
            SET name = COALESCE($1, name),
                region = COALESCE($2, region),
                contact_phone = COALESCE($3, contact_phone),
                contact_email = COALESCE($4, contact_email),
                updated_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            COOPERATIVE_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.region)
        .bind(&input.contact_phone)
        .bind(&input.contact_email)
        .bind(cooperative_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Cooperative".to_string()))
    }

    /// Activate or deactivate a cooperative; deactivation blocks its users from logging in
    pub async fn set_active(&self, cooperative_id: Uuid, is_active: bool) -> AppResult<Cooperative> {
        let cooperative = sqlx::query_as::<_, Cooperative>(&format!(
            "UPDATE cooperatives SET is_active = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            COOPERATIVE_COLUMNS
        ))
        .bind(is_active)
        .bind(cooperative_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Cooperative".to_string()))?;

        if !is_active {
            sqlx::query(
                r#"
                UPDATE refresh_tokens SET revoked_at = NOW()
                WHERE revoked_at IS NULL
                  AND user_id IN (SELECT id FROM users WHERE cooperative_id = $1)
                "#,
            )
            .bind(cooperative_id)
            .execute(&self.db)
            .await?;
        }

        tracing::info!(%cooperative_id, is_active, "cooperative status changed");
        Ok(cooperative)
    }

    /// The cooperative's short code, used to prefix generated identifiers
    pub async fn code_of(db: &PgPool, cooperative_id: Uuid) -> AppResult<String> {
        sqlx::query_scalar::<_, String>("SELECT code FROM cooperatives WHERE id = $1")
            .bind(cooperative_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Cooperative".to_string()))
    }

    /// Fail with 404 unless the cooperative exists
    pub async fn ensure_exists(db: &PgPool, cooperative_id: Uuid) -> AppResult<()> {
        let found = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM cooperatives WHERE id = $1)")
            .bind(cooperative_id)
            .fetch_one(db)
            .await?;
        if found {
            Ok(())
        } else {
            Err(AppError::NotFound("Cooperative".to_string()))
        }
    }

    /// Next value of a per-cooperative counter, allocated inside `tx`
    pub async fn next_sequence(
        tx: &mut Transaction<'_, Postgres>,
        cooperative_id: Uuid,
        kind: CodeKind,
        scope: &str,
    ) -> AppResult<i32> {
        let next = sqlx::query_scalar::<_, i32>("SELECT next_code_sequence($1, $2, $3)")
            .bind(cooperative_id)
            .bind(kind.sequence_key())
            .bind(scope)
            .fetch_one(&mut **tx)
            .await?;
        Ok(next)
    }
}
