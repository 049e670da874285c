//! Farmer registration and management service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{farmer_code, CodeKind, FarmerTotals, UserRole};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::cooperative::CooperativeService;
use crate::services::user::{CreateUserInput, UserService};

/// Farmer service
#[derive(Clone)]
pub struct FarmerService {
    db: PgPool,
}

/// Farmer row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Farmer {
    pub id: Uuid,
    pub cooperative_id: Uuid,
    pub farmer_code: String,
    pub name: String,
    pub phone: Option<String>,
    pub national_id: Option<String>,
    pub village: Option<String>,
    pub farm_size_ha: Option<Decimal>,
    pub user_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Farmer with delivery and payment totals
#[derive(Debug, Serialize)]
pub struct FarmerDetail {
    #[serde(flatten)]
    pub farmer: Farmer,
    pub totals: FarmerTotals,
}

/// Optional portal login created with the farmer
#[derive(Debug, Deserialize)]
pub struct FarmerLoginInput {
    pub email: String,
    pub password: String,
}

/// Input for registering a farmer
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterFarmerInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub phone: Option<String>,
    #[validate(length(min = 4, max = 50, message = "National ID must be 4-50 characters"))]
    pub national_id: Option<String>,
    pub village: Option<String>,
    pub farm_size_ha: Option<Decimal>,
    pub login: Option<FarmerLoginInput>,
}

/// Input for updating a farmer
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFarmerInput {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 4, max = 50, message = "National ID must be 4-50 characters"))]
    pub national_id: Option<String>,
    pub village: Option<String>,
    pub farm_size_ha: Option<Decimal>,
}

/// Farmer list filter
#[derive(Debug, Default, Deserialize)]
pub struct FarmerFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
}

const FARMER_COLUMNS: &str = "id, cooperative_id, farmer_code, name, phone, national_id, village, \
     farm_size_ha, user_id, is_active, created_at, updated_at";

impl FarmerService {
    /// Create a new FarmerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List farmers, optionally filtered by a free-text search and active flag
    pub async fn list_farmers(&self, cooperative_id: Uuid, filter: &FarmerFilter) -> AppResult<Vec<Farmer>> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));

        let farmers = sqlx::query_as::<_, Farmer>(&format!(
            r#"
            SELECT {}
            FROM farmers
            WHERE cooperative_id = $1
              AND ($2::text IS NULL
                   OR name ILIKE $2 OR farmer_code ILIKE $2
                   OR phone ILIKE $2 OR village ILIKE $2)
              AND ($3::boolean IS NULL OR is_active = $3)
            ORDER BY name
            "#,
            FARMER_COLUMNS
        ))
        .bind(cooperative_id)
        .bind(pattern)
        .bind(filter.active)
        .fetch_all(&self.db)
        .await?;

        Ok(farmers)
    }

    /// Get a farmer row
    pub async fn get_farmer(&self, cooperative_id: Uuid, farmer_id: Uuid) -> AppResult<Farmer> {
        sqlx::query_as::<_, Farmer>(&format!(
            "SELECT {} FROM farmers WHERE id = $1 AND cooperative_id = $2",
            FARMER_COLUMNS
        ))
        .bind(farmer_id)
        .bind(cooperative_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Farmer".to_string()))
    }

    /// Get a farmer with delivery and payment totals
    pub async fn get_farmer_detail(&self, cooperative_id: Uuid, farmer_id: Uuid) -> AppResult<FarmerDetail> {
        let farmer = self.get_farmer(cooperative_id, farmer_id).await?;
        let totals = self.get_totals(farmer_id).await?;
        Ok(FarmerDetail { farmer, totals })
    }

    /// Delivery and payment totals for a farmer
    pub async fn get_totals(&self, farmer_id: Uuid) -> AppResult<FarmerTotals> {
        let (harvest_count, delivered_kg, outstanding_kg): (i64, Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(weight_kg) FILTER (WHERE status = 'verified'), 0),
                   COALESCE(SUM(weight_kg) FILTER (WHERE status = 'verified' AND payment_id IS NULL), 0)
            FROM harvests
            WHERE farmer_id = $1
            "#,
        )
        .bind(farmer_id)
        .fetch_one(&self.db)
        .await?;

        let paid_amount: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE farmer_id = $1 AND status = 'paid'",
        )
        .bind(farmer_id)
        .fetch_one(&self.db)
        .await?;

        Ok(FarmerTotals {
            harvest_count,
            delivered_kg,
            paid_amount,
            outstanding_kg,
        })
    }

    /// Register a farmer, generating the farmer code and optionally a portal login
    pub async fn register_farmer(&self, cooperative_id: Uuid, input: RegisterFarmerInput) -> AppResult<Farmer> {
        input.validate()?;
        Self::validate_details(input.phone.as_deref(), input.farm_size_ha)?;

        let coop_code = CooperativeService::code_of(&self.db, cooperative_id).await?;

        let mut tx = self.db.begin().await?;

        let user_id = match input.login {
            Some(login) => {
                let user = UserService::insert_user(
                    &mut tx,
                    cooperative_id,
                    CreateUserInput {
                        name: input.name.clone(),
                        email: login.email,
                        password: login.password,
                        role: UserRole::Farmer,
                        phone: input.phone.clone(),
                    },
                )
                .await?;
                Some(user.id)
            }
            None => None,
        };

        let sequence = CooperativeService::next_sequence(&mut tx, cooperative_id, CodeKind::Farmer, "all").await?;
        let code = farmer_code(&coop_code, sequence);

        let farmer = sqlx::query_as::<_, Farmer>(&format!(
            r#"
            INSERT INTO farmers (cooperative_id, farmer_code, name, phone, national_id, village, farm_size_ha, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            FARMER_COLUMNS
        ))
        .bind(cooperative_id)
        .bind(&code)
        .bind(input.name.trim())
        .bind(&input.phone)
        .bind(&input.national_id)
        .bind(&input.village)
        .bind(input.farm_size_ha)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "national_id"))?;

        tx.commit().await?;

        tracing::info!(farmer_id = %farmer.id, farmer_code = %farmer.farmer_code, %cooperative_id, "farmer registered");
        Ok(farmer)
    }

    /// Update farmer details
    pub async fn update_farmer(
        &self,
        cooperative_id: Uuid,
        farmer_id: Uuid,
        input: UpdateFarmerInput,
    ) -> AppResult<Farmer> {
        input.validate()?;
        Self::validate_details(input.phone.as_deref(), input.farm_size_ha)?;

        sqlx::query_as::<_, Farmer>(&format!(
            r#"
            UPDATE farmers
            SET name = COALESCE($1, name),
                phone = COALESCE($2, phone),
                national_id = COALESCE($3, national_id),
                village = COALESCE($4, village),
                farm_size_ha = COALESCE($5, farm_size_ha),
                updated_at = NOW()
            WHERE id = $6 AND cooperative_id = $7
            RETURNING {}
            "#,
            FARMER_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.phone)
        .bind(&input.national_id)
        .bind(&input.village)
        .bind(input.farm_size_ha)
        .bind(farmer_id)
        .bind(cooperative_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "national_id"))?
        .ok_or_else(|| AppError::NotFound("Farmer".to_string()))
    }

    /// Deactivate a farmer. Refused while the farmer has harvests awaiting inspection.
    pub async fn deactivate_farmer(&self, cooperative_id: Uuid, farmer_id: Uuid) -> AppResult<()> {
        let farmer = self.get_farmer(cooperative_id, farmer_id).await?;

        let pending = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM harvests WHERE farmer_id = $1 AND status = 'pending'",
        )
        .bind(farmer_id)
        .fetch_one(&self.db)
        .await?;

        if pending > 0 {
            return Err(AppError::Conflict {
                resource: "farmer".to_string(),
                message: format!("Farmer has {} harvest(s) awaiting inspection", pending),
            });
        }

        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE farmers SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(farmer_id)
            .execute(&mut *tx)
            .await?;

        if let Some(user_id) = farmer.user_id {
            sqlx::query("UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(%farmer_id, %cooperative_id, "farmer deactivated");
        Ok(())
    }

    fn validate_details(phone: Option<&str>, farm_size_ha: Option<Decimal>) -> AppResult<()> {
        if let Some(phone) = phone {
            shared::validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
        }
        if matches!(farm_size_ha, Some(size) if size <= Decimal::ZERO) {
            return Err(AppError::validation("farm_size_ha", "Farm size must be greater than 0"));
        }
        if matches!(farm_size_ha, Some(size) if !shared::fits_stored_scale(size)) {
            return Err(AppError::validation("farm_size_ha", "Farm size can have at most 2 decimal places"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_validation() {
        assert!(FarmerService::validate_details(Some("+254712345678"), Some(Decimal::from(2))).is_ok());
        assert!(FarmerService::validate_details(None, None).is_ok());
        assert!(FarmerService::validate_details(Some("12"), None).is_err());
        assert!(FarmerService::validate_details(None, Some(Decimal::ZERO)).is_err());
        assert!(FarmerService::validate_details(None, Some(Decimal::new(2505, 3))).is_err());
    }

    #[test]
    fn test_register_input_requires_name() {
        let input = RegisterFarmerInput {
            name: String::new(),
            phone: None,
            national_id: None,
            village: None,
            farm_size_ha: None,
            login: None,
        };
        assert!(input.validate().is_err());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_farmers_hidden_from_other_cooperatives() {
        use crate::services::test_support::{seed_cooperative, seed_farmer, test_pool};

        let Some(pool) = test_pool("test_farmers_hidden_from_other_cooperatives").await else {
            return;
        };
        let coop = seed_cooperative(&pool).await;
        let other = seed_cooperative(&pool).await;
        let farmer_id = seed_farmer(&pool, coop).await;

        let service = FarmerService::new(pool);
        assert_eq!(service.get_farmer(coop, farmer_id).await.unwrap().id, farmer_id);
        assert!(matches!(service.get_farmer(other, farmer_id).await, Err(AppError::NotFound(_))));
        let listed = service.list_farmers(other, &FarmerFilter::default()).await.unwrap();
        assert!(listed.iter().all(|f| f.cooperative_id == other));
    }
}
