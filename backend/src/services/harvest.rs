//! Harvest management service for recording and inspecting deliveries

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{DateRange, HarvestStatus, QualityGrade};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Harvest service for recording deliveries and quality verification
#[derive(Clone)]
pub struct HarvestService {
    db: PgPool,
}

/// Harvest information with the farmer it came from
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Harvest {
    pub id: Uuid,
    pub cooperative_id: Uuid,
    pub farmer_id: Uuid,
    pub farmer_name: String,
    pub farmer_code: String,
    pub crop: String,
    pub weight_kg: Decimal,
    pub harvest_date: NaiveDate,
    pub status: String,
    pub grade: Option<String>,
    pub moisture_percent: Option<Decimal>,
    pub inspector_id: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub inspection_notes: Option<String>,
    pub batch_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub recorded_by: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Harvest {
    pub fn status(&self) -> AppResult<HarvestStatus> {
        HarvestStatus::parse(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown harvest status {}", self.status)))
    }
}

/// Input for recording a harvest
#[derive(Debug, Deserialize)]
pub struct RecordHarvestInput {
    pub farmer_id: Uuid,
    pub crop: String,
    pub weight_kg: Decimal,
    pub harvest_date: NaiveDate,
    pub notes: Option<String>,
}

/// Input for updating a pending harvest
#[derive(Debug, Deserialize)]
pub struct UpdateHarvestInput {
    pub crop: Option<String>,
    pub weight_kg: Option<Decimal>,
    pub harvest_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Inspection result
#[derive(Debug, Deserialize)]
pub struct VerifyHarvestInput {
    pub grade: QualityGrade,
    pub moisture_percent: Option<Decimal>,
    pub notes: Option<String>,
}

/// Harvest list filter
#[derive(Debug, Default, Deserialize)]
pub struct HarvestFilter {
    pub status: Option<String>,
    pub farmer_id: Option<Uuid>,
    pub crop: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

const HARVEST_SELECT: &str = r#"
    SELECT h.id, h.cooperative_id, h.farmer_id, f.name AS farmer_name, f.farmer_code,
           h.crop, h.weight_kg, h.harvest_date, h.status, h.grade, h.moisture_percent,
           h.inspector_id, h.verified_at, h.inspection_notes, h.batch_id, h.payment_id,
           h.recorded_by, h.notes, h.created_at, h.updated_at
    FROM harvests h
    JOIN farmers f ON f.id = h.farmer_id
"#;

impl HarvestService {
    /// Create a new HarvestService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List harvests of a cooperative
    pub async fn get_harvests(&self, cooperative_id: Uuid, filter: &HarvestFilter) -> AppResult<Vec<Harvest>> {
        if let Some(status) = filter.status.as_deref() {
            if HarvestStatus::parse(status).is_none() {
                return Err(AppError::validation("status", format!("Unknown harvest status '{}'", status)));
            }
        }
        let crop = filter
            .crop
            .as_deref()
            .map(shared::normalize_crop)
            .transpose()
            .map_err(|m| AppError::validation("crop", m))?;
        let range = DateRange::from_bounds(filter.from, filter.to);

        let harvests = sqlx::query_as::<_, Harvest>(&format!(
            r#"{}
            WHERE h.cooperative_id = $1
              AND ($2::text IS NULL OR h.status = $2)
              AND ($3::uuid IS NULL OR h.farmer_id = $3)
              AND ($4::text IS NULL OR h.crop = $4)
              AND h.harvest_date BETWEEN $5 AND $6
            ORDER BY h.harvest_date DESC, h.created_at DESC
            "#,
            HARVEST_SELECT
        ))
        .bind(cooperative_id)
        .bind(&filter.status)
        .bind(filter.farmer_id)
        .bind(crop)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(harvests)
    }

    /// Get a harvest by ID
    pub async fn get_harvest(&self, cooperative_id: Uuid, harvest_id: Uuid) -> AppResult<Harvest> {
        sqlx::query_as::<_, Harvest>(&format!(
            "{} WHERE h.id = $1 AND h.cooperative_id = $2",
            HARVEST_SELECT
        ))
        .bind(harvest_id)
        .bind(cooperative_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Harvest".to_string()))
    }

    /// Harvests of one batch
    pub async fn get_harvests_by_batch(&self, cooperative_id: Uuid, batch_id: Uuid) -> AppResult<Vec<Harvest>> {
        let harvests = sqlx::query_as::<_, Harvest>(&format!(
            "{} WHERE h.batch_id = $1 AND h.cooperative_id = $2 ORDER BY h.harvest_date, h.created_at",
            HARVEST_SELECT
        ))
        .bind(batch_id)
        .bind(cooperative_id)
        .fetch_all(&self.db)
        .await?;

        Ok(harvests)
    }

    /// Record a new delivery; it starts out pending inspection
    pub async fn record_harvest(
        &self,
        cooperative_id: Uuid,
        recorded_by: Uuid,
        input: RecordHarvestInput,
    ) -> AppResult<Harvest> {
        let crop = Self::validate_delivery(&input.crop, input.weight_kg, input.harvest_date)?;

        let farmer_active = sqlx::query_scalar::<_, bool>(
            "SELECT is_active FROM farmers WHERE id = $1 AND cooperative_id = $2",
        )
        .bind(input.farmer_id)
        .bind(cooperative_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Farmer".to_string()))?;

        if !farmer_active {
            return Err(AppError::validation("farmer_id", "Farmer is deactivated"));
        }

        let harvest_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO harvests (cooperative_id, farmer_id, crop, weight_kg, harvest_date, recorded_by, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(cooperative_id)
        .bind(input.farmer_id)
        .bind(&crop)
        .bind(input.weight_kg)
        .bind(input.harvest_date)
        .bind(recorded_by)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(%harvest_id, farmer_id = %input.farmer_id, %crop, weight_kg = %input.weight_kg, "harvest recorded");

        self.get_harvest(cooperative_id, harvest_id).await
    }

    /// Update a harvest that has not been inspected yet
    pub async fn update_harvest(
        &self,
        cooperative_id: Uuid,
        harvest_id: Uuid,
        input: UpdateHarvestInput,
    ) -> AppResult<Harvest> {
        let existing = self.get_harvest(cooperative_id, harvest_id).await?;
        Self::ensure_editable(&existing)?;

        let crop = Self::validate_delivery(
            input.crop.as_deref().unwrap_or(&existing.crop),
            input.weight_kg.unwrap_or(existing.weight_kg),
            input.harvest_date.unwrap_or(existing.harvest_date),
        )?;

        // Guard on status so a concurrent verification wins
        let updated = sqlx::query(
            r#"
            UPDATE harvests
            SET crop = $1, weight_kg = $2, harvest_date = $3, notes = COALESCE($4, notes), updated_at = NOW()
            WHERE id = $5 AND cooperative_id = $6 AND status = 'pending'
            "#,
        )
        .bind(&crop)
        .bind(input.weight_kg.unwrap_or(existing.weight_kg))
        .bind(input.harvest_date.unwrap_or(existing.harvest_date))
        .bind(&input.notes)
        .bind(harvest_id)
        .bind(cooperative_id)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::InvalidStateTransition(
                "Harvest was inspected while being edited".to_string(),
            ));
        }

        self.get_harvest(cooperative_id, harvest_id).await
    }

    /// Delete a harvest that has not been inspected yet
    pub async fn delete_harvest(&self, cooperative_id: Uuid, harvest_id: Uuid) -> AppResult<()> {
        let existing = self.get_harvest(cooperative_id, harvest_id).await?;
        Self::ensure_editable(&existing)?;

        sqlx::query("DELETE FROM harvests WHERE id = $1 AND cooperative_id = $2 AND status = 'pending'")
            .bind(harvest_id)
            .bind(cooperative_id)
            .execute(&self.db)
            .await?;

        tracing::info!(%harvest_id, "harvest deleted");
        Ok(())
    }

    /// Record the inspection result: verified with a grade, or rejected
    pub async fn verify_harvest(
        &self,
        cooperative_id: Uuid,
        harvest_id: Uuid,
        inspector_id: Uuid,
        input: VerifyHarvestInput,
    ) -> AppResult<Harvest> {
        if let Some(moisture) = input.moisture_percent {
            shared::validate_moisture_content(moisture).map_err(|m| AppError::validation("moisture_percent", m))?;
        }

        let existing = self.get_harvest(cooperative_id, harvest_id).await?;
        let next = existing.status()?.verify(input.grade)?;

        let updated = sqlx::query(
            r#"
            UPDATE harvests
            SET status = $1, grade = $2, moisture_percent = $3, inspection_notes = $4,
                inspector_id = $5, verified_at = NOW(), updated_at = NOW()
            WHERE id = $6 AND cooperative_id = $7 AND status = 'pending'
            "#,
        )
        .bind(next.as_str())
        .bind(input.grade.as_str())
        .bind(input.moisture_percent)
        .bind(&input.notes)
        .bind(inspector_id)
        .bind(harvest_id)
        .bind(cooperative_id)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::InvalidStateTransition("Harvest was already inspected".to_string()));
        }

        tracing::info!(%harvest_id, %inspector_id, grade = %input.grade, status = %next, "harvest inspected");

        self.get_harvest(cooperative_id, harvest_id).await
    }

    fn ensure_editable(harvest: &Harvest) -> AppResult<()> {
        let status = harvest.status()?;
        if status.is_editable() {
            Ok(())
        } else {
            Err(AppError::InvalidStateTransition(format!(
                "Harvest is {} and can no longer be changed",
                status
            )))
        }
    }

    /// Validate delivery fields, returning the normalised crop name
    fn validate_delivery(crop: &str, weight_kg: Decimal, harvest_date: NaiveDate) -> AppResult<String> {
        let crop = shared::normalize_crop(crop).map_err(|m| AppError::validation("crop", m))?;
        shared::validate_weight(weight_kg).map_err(|m| AppError::validation("weight_kg", m))?;
        shared::validate_harvest_date(harvest_date, Utc::now().date_naive())
            .map_err(|m| AppError::validation("harvest_date", m))?;
        Ok(crop)
    }
}
