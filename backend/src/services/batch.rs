//! Batch service: grouping verified harvests of one crop for storage and dispatch

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    batch_code, check_batch_candidates, daily_scope, BatchCandidate, BatchStatus, CodeKind, HarvestStatus,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::cooperative::CooperativeService;
use crate::services::harvest::{Harvest, HarvestService};

/// Batch service
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
}

/// Batch row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Batch {
    pub id: Uuid,
    pub cooperative_id: Uuid,
    pub batch_code: String,
    pub crop: String,
    pub status: String,
    pub total_weight_kg: Decimal,
    pub harvest_count: i32,
    pub destination: Option<String>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    pub fn status(&self) -> AppResult<BatchStatus> {
        BatchStatus::parse(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown batch status {}", self.status)))
    }
}

/// Batch with its member harvests
#[derive(Debug, Serialize)]
pub struct BatchDetail {
    #[serde(flatten)]
    pub batch: Batch,
    pub harvests: Vec<Harvest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBatchInput {
    pub crop: String,
    pub harvest_ids: Vec<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddHarvestsInput {
    pub harvest_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DispatchBatchInput {
    pub destination: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchFilter {
    pub status: Option<String>,
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    id: Uuid,
    crop: String,
    status: String,
    batch_id: Option<Uuid>,
    weight_kg: Decimal,
}

const BATCH_COLUMNS: &str = "id, cooperative_id, batch_code, crop, status, total_weight_kg, harvest_count, \
     destination, dispatched_at, created_by, notes, created_at, updated_at";

impl BatchService {
    /// Create a new BatchService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List batches of a cooperative
    pub async fn list_batches(&self, cooperative_id: Uuid, filter: &BatchFilter) -> AppResult<Vec<Batch>> {
        if let Some(status) = filter.status.as_deref() {
            if BatchStatus::parse(status).is_none() {
                return Err(AppError::validation("status", format!("Unknown batch status '{}'", status)));
            }
        }

        let batches = sqlx::query_as::<_, Batch>(&format!(
            r#"
            SELECT {}
            FROM batches
            WHERE cooperative_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
            BATCH_COLUMNS
        ))
        .bind(cooperative_id)
        .bind(&filter.status)
        .fetch_all(&self.db)
        .await?;

        Ok(batches)
    }

    /// Get a batch row
    pub async fn get_batch(&self, cooperative_id: Uuid, batch_id: Uuid) -> AppResult<Batch> {
        sqlx::query_as::<_, Batch>(&format!(
            "SELECT {} FROM batches WHERE id = $1 AND cooperative_id = $2",
            BATCH_COLUMNS
        ))
        .bind(batch_id)
        .bind(cooperative_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))
    }

    /// Get a batch with its harvests
    pub async fn get_batch_detail(&self, cooperative_id: Uuid, batch_id: Uuid) -> AppResult<BatchDetail> {
        let batch = self.get_batch(cooperative_id, batch_id).await?;
        let harvests = HarvestService::new(self.db.clone())
            .get_harvests_by_batch(cooperative_id, batch_id)
            .await?;
        Ok(BatchDetail { batch, harvests })
    }

    /// Create an open batch from verified harvests of one crop
    pub async fn create_batch(
        &self,
        cooperative_id: Uuid,
        created_by: Uuid,
        input: CreateBatchInput,
    ) -> AppResult<BatchDetail> {
        let crop = shared::normalize_crop(&input.crop).map_err(|m| AppError::validation("crop", m))?;
        let coop_code = CooperativeService::code_of(&self.db, cooperative_id).await?;

        let mut tx = self.db.begin().await?;

        let candidates = Self::lock_candidates(&mut tx, cooperative_id, &input.harvest_ids).await?;
        check_batch_candidates(&crop, &candidates)?;

        let today = Utc::now().date_naive();
        let sequence = CooperativeService::next_sequence(
            &mut tx,
            cooperative_id,
            CodeKind::Batch,
            &daily_scope(today),
        )
        .await?;
        let code = batch_code(&coop_code, today, sequence);

        let batch_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO batches (cooperative_id, batch_code, crop, created_by, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(cooperative_id)
        .bind(&code)
        .bind(&crop)
        .bind(created_by)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        Self::assign(&mut tx, batch_id, &input.harvest_ids).await?;
        Self::recompute_totals(&mut tx, batch_id).await?;

        tx.commit().await?;

        tracing::info!(%batch_id, batch_code = %code, %crop, harvests = input.harvest_ids.len(), "batch created");

        self.get_batch_detail(cooperative_id, batch_id).await
    }

    /// Add verified harvests to an open batch
    pub async fn add_harvests(
        &self,
        cooperative_id: Uuid,
        batch_id: Uuid,
        input: AddHarvestsInput,
    ) -> AppResult<BatchDetail> {
        let mut tx = self.db.begin().await?;

        let batch = Self::lock_batch(&mut tx, cooperative_id, batch_id).await?;
        batch.status()?.ensure_open()?;

        let candidates = Self::lock_candidates(&mut tx, cooperative_id, &input.harvest_ids).await?;
        check_batch_candidates(&batch.crop, &candidates)?;

        Self::assign(&mut tx, batch_id, &input.harvest_ids).await?;
        Self::recompute_totals(&mut tx, batch_id).await?;

        tx.commit().await?;

        self.get_batch_detail(cooperative_id, batch_id).await
    }

    /// Take a harvest out of an open batch
    pub async fn remove_harvest(
        &self,
        cooperative_id: Uuid,
        batch_id: Uuid,
        harvest_id: Uuid,
    ) -> AppResult<BatchDetail> {
        let mut tx = self.db.begin().await?;

        let batch = Self::lock_batch(&mut tx, cooperative_id, batch_id).await?;
        batch.status()?.ensure_open()?;

        let removed = sqlx::query(
            "UPDATE harvests SET batch_id = NULL, updated_at = NOW() WHERE id = $1 AND batch_id = $2",
        )
        .bind(harvest_id)
        .bind(batch_id)
        .execute(&mut *tx)
        .await?;

        if removed.rows_affected() == 0 {
            return Err(AppError::NotFound("Harvest in batch".to_string()));
        }

        Self::recompute_totals(&mut tx, batch_id).await?;
        tx.commit().await?;

        self.get_batch_detail(cooperative_id, batch_id).await
    }

    /// Close an open, non-empty batch
    pub async fn close_batch(&self, cooperative_id: Uuid, batch_id: Uuid) -> AppResult<Batch> {
        let mut tx = self.db.begin().await?;

        let batch = Self::lock_batch(&mut tx, cooperative_id, batch_id).await?;
        let next = batch.status()?.close(batch.harvest_count)?;

        let batch = Self::set_status(&mut tx, batch_id, next, None).await?;
        tx.commit().await?;

        tracing::info!(%batch_id, batch_code = %batch.batch_code, "batch closed");
        Ok(batch)
    }

    /// Dispatch a closed batch
    pub async fn dispatch_batch(
        &self,
        cooperative_id: Uuid,
        batch_id: Uuid,
        input: DispatchBatchInput,
    ) -> AppResult<Batch> {
        let destination = input.destination.trim();
        if destination.is_empty() {
            return Err(AppError::validation("destination", "Destination is required"));
        }

        let mut tx = self.db.begin().await?;

        let batch = Self::lock_batch(&mut tx, cooperative_id, batch_id).await?;
        let next = batch.status()?.dispatch()?;

        let batch = Self::set_status(&mut tx, batch_id, next, Some(destination)).await?;
        tx.commit().await?;

        tracing::info!(
            %batch_id,
            batch_code = %batch.batch_code,
            %destination,
            total_weight_kg = %batch.total_weight_kg,
            "batch dispatched"
        );
        Ok(batch)
    }

    async fn lock_batch(
        tx: &mut Transaction<'_, Postgres>,
        cooperative_id: Uuid,
        batch_id: Uuid,
    ) -> AppResult<Batch> {
        sqlx::query_as::<_, Batch>(&format!(
            "SELECT {} FROM batches WHERE id = $1 AND cooperative_id = $2 FOR UPDATE",
            BATCH_COLUMNS
        ))
        .bind(batch_id)
        .bind(cooperative_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))
    }

    /// Lock the requested harvests; any id outside the tenant is reported as not found
    async fn lock_candidates(
        tx: &mut Transaction<'_, Postgres>,
        cooperative_id: Uuid,
        harvest_ids: &[Uuid],
    ) -> AppResult<Vec<BatchCandidate>> {
        let mut ids = harvest_ids.to_vec();
        ids.sort();
        ids.dedup();
        if ids.len() != harvest_ids.len() {
            return Err(AppError::validation("harvest_ids", "Harvest ids must be unique"));
        }

        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT id, crop, status, batch_id, weight_kg
            FROM harvests
            WHERE cooperative_id = $1 AND id = ANY($2)
            FOR UPDATE
            "#,
        )
        .bind(cooperative_id)
        .bind(&ids)
        .fetch_all(&mut **tx)
        .await?;

        if rows.len() != ids.len() {
            return Err(AppError::NotFound("Harvest".to_string()));
        }

        rows.into_iter()
            .map(|row| {
                let status = HarvestStatus::parse(&row.status)
                    .ok_or_else(|| AppError::Internal(format!("Unknown harvest status {}", row.status)))?;
                Ok(BatchCandidate {
                    id: row.id,
                    crop: row.crop,
                    status,
                    batch_id: row.batch_id,
                    weight_kg: row.weight_kg,
                })
            })
            .collect()
    }

    async fn assign(tx: &mut Transaction<'_, Postgres>, batch_id: Uuid, harvest_ids: &[Uuid]) -> AppResult<()> {
        sqlx::query("UPDATE harvests SET batch_id = $1, updated_at = NOW() WHERE id = ANY($2)")
            .bind(batch_id)
            .bind(harvest_ids)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn recompute_totals(tx: &mut Transaction<'_, Postgres>, batch_id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE batches b
            SET total_weight_kg = t.total, harvest_count = t.cnt, updated_at = NOW()
            FROM (
                SELECT COALESCE(SUM(weight_kg), 0) AS total, COUNT(*)::int AS cnt
                FROM harvests WHERE batch_id = $1
            ) t
            WHERE b.id = $1
            "#,
        )
        .bind(batch_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn set_status(
        tx: &mut Transaction<'_, Postgres>,
        batch_id: Uuid,
        status: BatchStatus,
        destination: Option<&str>,
    ) -> AppResult<Batch> {
        let dispatched = status == BatchStatus::Dispatched;
        let batch = sqlx::query_as::<_, Batch>(&format!(
            r#"
            UPDATE batches
            SET status = $1,
                destination = COALESCE($2, destination),
                dispatched_at = CASE WHEN $3 THEN NOW() ELSE dispatched_at END,
                updated_at = NOW()
            WHERE id = $4
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(status.as_str())
        .bind(destination)
        .bind(dispatched)
        .bind(batch_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(batch)
    }
}
