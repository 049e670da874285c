//! Daily price configuration

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{PriceBook, PriceEntry, QualityGrade};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Price service
#[derive(Clone)]
pub struct PriceService {
    db: PgPool,
}

/// Stored price row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PriceRecord {
    pub id: Uuid,
    pub crop: String,
    pub grade: String,
    pub price_per_kg: Decimal,
    pub effective_date: NaiveDate,
    pub set_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The prices in force on a day
#[derive(Debug, Serialize)]
pub struct PriceSheet {
    pub date: NaiveDate,
    pub currency: String,
    pub entries: Vec<PriceEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    pub crop: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct PriceInput {
    pub crop: String,
    pub grade: QualityGrade,
    pub price_per_kg: Decimal,
}

/// A day's prices
#[derive(Debug, Deserialize)]
pub struct SetPricesInput {
    pub effective_date: Option<NaiveDate>,
    pub entries: Vec<PriceInput>,
}

#[derive(sqlx::FromRow)]
struct PriceRow {
    crop: String,
    grade: String,
    price_per_kg: Decimal,
    effective_date: NaiveDate,
}

impl TryFrom<PriceRow> for PriceEntry {
    type Error = AppError;

    fn try_from(row: PriceRow) -> AppResult<Self> {
        let grade = QualityGrade::parse(&row.grade)
            .ok_or_else(|| AppError::Internal(format!("Unknown grade {}", row.grade)))?;
        Ok(PriceEntry {
            crop: row.crop,
            grade,
            price_per_kg: row.price_per_kg,
            effective_date: row.effective_date,
        })
    }
}

impl PriceService {
    /// Create a new PriceService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Load every price of the cooperative up to `until`
    pub async fn load_book(&self, cooperative_id: Uuid, until: NaiveDate) -> AppResult<PriceBook> {
        let rows = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT crop, grade, price_per_kg, effective_date
            FROM prices
            WHERE cooperative_id = $1 AND effective_date <= $2
            "#,
        )
        .bind(cooperative_id)
        .bind(until)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(PriceEntry::try_from).collect()
    }

    /// The sheet effective on the requested day (default today)
    pub async fn get_sheet(&self, cooperative_id: Uuid, currency: &str, query: &PriceQuery) -> AppResult<PriceSheet> {
        let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
        let crop = Self::crop_filter(query.crop.as_deref())?;

        let book = self.load_book(cooperative_id, date).await?;
        let entries = book
            .sheet_on(date)
            .into_iter()
            .filter(|e| crop.as_deref().map_or(true, |c| e.crop == c))
            .collect();

        Ok(PriceSheet {
            date,
            currency: currency.to_string(),
            entries,
        })
    }

    /// Every stored price, newest first
    pub async fn get_history(&self, cooperative_id: Uuid, crop: Option<&str>) -> AppResult<Vec<PriceRecord>> {
        let crop = Self::crop_filter(crop)?;

        let rows = sqlx::query_as::<_, PriceRecord>(
            r#"
            SELECT id, crop, grade, price_per_kg, effective_date, set_by, created_at, updated_at
            FROM prices
            WHERE cooperative_id = $1 AND ($2::text IS NULL OR crop = $2)
            ORDER BY effective_date DESC, crop, grade
            "#,
        )
        .bind(cooperative_id)
        .bind(crop)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Upsert a day's prices; an entry for an existing (crop, grade, day) replaces it
    pub async fn set_prices(
        &self,
        cooperative_id: Uuid,
        set_by: Uuid,
        currency: &str,
        input: SetPricesInput,
    ) -> AppResult<PriceSheet> {
        let effective_date = input.effective_date.unwrap_or_else(|| Utc::now().date_naive());
        let entries = Self::prepare_entries(effective_date, input.entries)?;

        let mut tx = self.db.begin().await?;
        for entry in &entries {
            sqlx::query(
                r#"
                INSERT INTO prices (cooperative_id, crop, grade, price_per_kg, effective_date, set_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (cooperative_id, crop, grade, effective_date)
                DO UPDATE SET price_per_kg = EXCLUDED.price_per_kg, set_by = EXCLUDED.set_by, updated_at = NOW()
                "#,
            )
            .bind(cooperative_id)
            .bind(&entry.crop)
            .bind(entry.grade.as_str())
            .bind(entry.price_per_kg)
            .bind(entry.effective_date)
            .bind(set_by)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(%cooperative_id, %effective_date, entries = entries.len(), "prices updated");

        self.get_sheet(
            cooperative_id,
            currency,
            &PriceQuery {
                crop: None,
                date: Some(effective_date),
            },
        )
        .await
    }

    /// Normalise and validate the submitted entries
    fn prepare_entries(effective_date: NaiveDate, inputs: Vec<PriceInput>) -> AppResult<Vec<PriceEntry>> {
        if inputs.is_empty() {
            return Err(AppError::validation("entries", "At least one price is required"));
        }

        let mut entries: Vec<PriceEntry> = Vec::with_capacity(inputs.len());
        for input in inputs {
            let entry = PriceEntry {
                crop: shared::normalize_crop(&input.crop).map_err(|m| AppError::validation("crop", m))?,
                grade: input.grade,
                price_per_kg: input.price_per_kg,
                effective_date,
            };
            entry.validate()?;
            if entries.iter().any(|e| e.crop == entry.crop && e.grade == entry.grade) {
                return Err(AppError::validation(
                    "entries",
                    format!("Duplicate price for {} grade {}", entry.crop, entry.grade),
                ));
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    fn crop_filter(crop: Option<&str>) -> AppResult<Option<String>> {
        crop.filter(|c| !c.trim().is_empty())
            .map(shared::normalize_crop)
            .transpose()
            .map_err(|m| AppError::validation("crop", m))
    }
}
