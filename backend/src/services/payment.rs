//! Payment processing: pricing verified harvests and tracking payouts to farmers

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    calculate_payment_run, daily_scope, payment_reference, CodeKind, DateRange, FarmerPaymentSummary, PayableHarvest,
    PaymentMethod, PaymentRunSummary, PaymentStatus, QualityGrade,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::cooperative::CooperativeService;
use crate::services::price::PriceService;

/// Payment service
#[derive(Clone)]
pub struct PaymentService {
    db: PgPool,
    currency: String,
}

/// Payment row with the farmer's name
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub cooperative_id: Uuid,
    pub farmer_id: Uuid,
    pub farmer_name: String,
    pub farmer_code: String,
    pub reference: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_weight_kg: Decimal,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub method: Option<String>,
    pub transaction_ref: Option<String>,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn status(&self) -> AppResult<PaymentStatus> {
        PaymentStatus::parse(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown payment status {}", self.status)))
    }
}

/// One priced harvest of a payment
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentItem {
    pub harvest_id: Uuid,
    pub crop: String,
    pub grade: String,
    pub weight_kg: Decimal,
    pub harvest_date: NaiveDate,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PaymentDetail {
    #[serde(flatten)]
    pub payment: Payment,
    pub items: Vec<PaymentItem>,
}

/// Period and farmers a payment run covers
#[derive(Debug, Deserialize)]
pub struct PaymentRunInput {
    pub period_start: Option<NaiveDate>,
    pub period_end: NaiveDate,
    pub farmer_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize)]
pub struct PaymentRunPreview {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub currency: String,
    #[serde(flatten)]
    pub summary: PaymentRunSummary,
}

#[derive(Debug, Deserialize)]
pub struct PayInput {
    pub method: PaymentMethod,
    pub transaction_ref: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<String>,
    pub farmer_id: Option<Uuid>,
}

#[derive(sqlx::FromRow)]
struct PayableRow {
    id: Uuid,
    farmer_id: Uuid,
    crop: String,
    grade: Option<String>,
    weight_kg: Decimal,
    harvest_date: NaiveDate,
}

const PAYMENT_SELECT: &str = r#"
    SELECT p.id, p.cooperative_id, p.farmer_id, f.name AS farmer_name, f.farmer_code,
           p.reference, p.period_start, p.period_end, p.total_weight_kg, p.amount, p.currency,
           p.status, p.method, p.transaction_ref, p.created_by, p.approved_by, p.approved_at,
           p.paid_at, p.created_at, p.updated_at
    FROM payments p
    JOIN farmers f ON f.id = p.farmer_id
"#;

impl PaymentService {
    /// Create a new PaymentService instance
    pub fn new(db: PgPool, currency: impl Into<String>) -> Self {
        Self {
            db,
            currency: currency.into(),
        }
    }

    /// Price the period's verified, unpaid harvests without writing anything
    pub async fn preview(&self, cooperative_id: Uuid, input: &PaymentRunInput) -> AppResult<PaymentRunPreview> {
        let period = Self::period(input)?;
        let harvests = Self::payable_harvests(&self.db, cooperative_id, period, input.farmer_ids.as_deref(), false).await?;
        let prices = PriceService::new(self.db.clone()).load_book(cooperative_id, period.end).await?;
        let summary = calculate_payment_run(&harvests, &prices)?;

        Ok(PaymentRunPreview {
            period_start: period.start,
            period_end: period.end,
            currency: self.currency.clone(),
            summary,
        })
    }

    /// Create one pending payment per farmer and attach the priced harvests to it
    pub async fn generate(
        &self,
        cooperative_id: Uuid,
        created_by: Uuid,
        input: &PaymentRunInput,
    ) -> AppResult<Vec<Payment>> {
        let period = Self::period(input)?;
        let coop_code = CooperativeService::code_of(&self.db, cooperative_id).await?;
        let prices = PriceService::new(self.db.clone()).load_book(cooperative_id, period.end).await?;

        let mut tx = self.db.begin().await?;

        let harvests =
            Self::payable_harvests(&mut *tx, cooperative_id, period, input.farmer_ids.as_deref(), true).await?;
        if harvests.is_empty() {
            return Err(AppError::NothingEligible(
                "No verified, unpaid harvests in the selected period".to_string(),
            ));
        }

        let run = calculate_payment_run(&harvests, &prices)?;
        let today = Utc::now().date_naive();

        let mut payment_ids = Vec::with_capacity(run.farmer_count);
        for farmer in &run.farmers {
            let sequence = CooperativeService::next_sequence(
                &mut tx,
                cooperative_id,
                CodeKind::Payment,
                &daily_scope(today),
            )
            .await?;
            let reference = payment_reference(&coop_code, today, sequence);
            let payment_id =
                Self::insert_payment(&mut tx, cooperative_id, created_by, period, &reference, &self.currency, farmer)
                    .await?;
            payment_ids.push(payment_id);
        }

        tx.commit().await?;

        tracing::info!(
            %cooperative_id,
            period_start = %period.start,
            period_end = %period.end,
            farmers = run.farmer_count,
            harvests = run.harvest_count,
            total_amount = %run.total_amount,
            "payment run generated"
        );

        let payments = sqlx::query_as::<_, Payment>(&format!(
            "{} WHERE p.id = ANY($1) ORDER BY f.name",
            PAYMENT_SELECT
        ))
        .bind(&payment_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(payments)
    }

    /// List payments of a cooperative
    pub async fn list_payments(&self, cooperative_id: Uuid, filter: &PaymentFilter) -> AppResult<Vec<Payment>> {
        if let Some(status) = filter.status.as_deref() {
            if PaymentStatus::parse(status).is_none() {
                return Err(AppError::validation("status", format!("Unknown payment status '{}'", status)));
            }
        }

        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"{}
            WHERE p.cooperative_id = $1
              AND ($2::text IS NULL OR p.status = $2)
              AND ($3::uuid IS NULL OR p.farmer_id = $3)
            ORDER BY p.created_at DESC, p.reference DESC
            "#,
            PAYMENT_SELECT
        ))
        .bind(cooperative_id)
        .bind(&filter.status)
        .bind(filter.farmer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(payments)
    }

    /// Get a payment row
    pub async fn get_payment(&self, cooperative_id: Uuid, payment_id: Uuid) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>(&format!(
            "{} WHERE p.id = $1 AND p.cooperative_id = $2",
            PAYMENT_SELECT
        ))
        .bind(payment_id)
        .bind(cooperative_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment".to_string()))
    }

    /// Get a payment with its items
    pub async fn get_payment_detail(&self, cooperative_id: Uuid, payment_id: Uuid) -> AppResult<PaymentDetail> {
        let payment = self.get_payment(cooperative_id, payment_id).await?;
        let items = sqlx::query_as::<_, PaymentItem>(
            r#"
            SELECT harvest_id, crop, grade, weight_kg, harvest_date, unit_price, amount
            FROM payment_items
            WHERE payment_id = $1
            ORDER BY harvest_date, harvest_id
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.db)
        .await?;

        Ok(PaymentDetail { payment, items })
    }

    /// Approve a pending payment
    pub async fn approve(&self, cooperative_id: Uuid, payment_id: Uuid, approver: Uuid) -> AppResult<Payment> {
        let payment = self.get_payment(cooperative_id, payment_id).await?;
        let next = payment.status()?.approve()?;

        let updated = sqlx::query(
            r#"
            UPDATE payments
            SET status = $1, approved_by = $2, approved_at = NOW(), updated_at = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(next.as_str())
        .bind(approver)
        .bind(payment_id)
        .bind(&payment.status)
        .execute(&self.db)
        .await?;
        Self::ensure_changed(updated.rows_affected())?;

        tracing::info!(%payment_id, reference = %payment.reference, %approver, "payment approved");
        self.get_payment(cooperative_id, payment_id).await
    }

    /// Mark an approved payment as paid out
    pub async fn pay(&self, cooperative_id: Uuid, payment_id: Uuid, input: PayInput) -> AppResult<Payment> {
        let transaction_ref = Self::check_transaction_ref(input.method, input.transaction_ref.as_deref())?;

        let payment = self.get_payment(cooperative_id, payment_id).await?;
        let next = payment.status()?.pay()?;

        let updated = sqlx::query(
            r#"
            UPDATE payments
            SET status = $1, method = $2, transaction_ref = $3, paid_at = NOW(), updated_at = NOW()
            WHERE id = $4 AND status = $5
            "#,
        )
        .bind(next.as_str())
        .bind(input.method.as_str())
        .bind(transaction_ref)
        .bind(payment_id)
        .bind(&payment.status)
        .execute(&self.db)
        .await?;
        Self::ensure_changed(updated.rows_affected())?;

        tracing::info!(
            %payment_id,
            reference = %payment.reference,
            amount = %payment.amount,
            method = input.method.as_str(),
            "payment paid"
        );
        self.get_payment(cooperative_id, payment_id).await
    }

    /// Cancel a payment that has not been paid; its harvests become payable again
    pub async fn cancel(&self, cooperative_id: Uuid, payment_id: Uuid) -> AppResult<Payment> {
        let payment = self.get_payment(cooperative_id, payment_id).await?;
        let next = payment.status()?.cancel()?;

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query("UPDATE payments SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3")
            .bind(next.as_str())
            .bind(payment_id)
            .bind(&payment.status)
            .execute(&mut *tx)
            .await?;
        Self::ensure_changed(updated.rows_affected())?;

        let released = sqlx::query("UPDATE harvests SET payment_id = NULL, updated_at = NOW() WHERE payment_id = $1")
            .bind(payment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(%payment_id, reference = %payment.reference, released = released.rows_affected(), "payment cancelled");
        self.get_payment(cooperative_id, payment_id).await
    }

    /// Verified harvests without a payment, dated inside `period`
    async fn payable_harvests<'e, E>(
        executor: E,
        cooperative_id: Uuid,
        period: DateRange,
        farmer_ids: Option<&[Uuid]>,
        lock: bool,
    ) -> AppResult<Vec<PayableHarvest>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, PayableRow>(&format!(
            r#"
            SELECT id, farmer_id, crop, grade, weight_kg, harvest_date
            FROM harvests
            WHERE cooperative_id = $1
              AND status = 'verified'
              AND payment_id IS NULL
              AND harvest_date BETWEEN $2 AND $3
              AND ($4::uuid[] IS NULL OR farmer_id = ANY($4))
            ORDER BY harvest_date, id
            {}
            "#,
            if lock { "FOR UPDATE" } else { "" }
        ))
        .bind(cooperative_id)
        .bind(period.start)
        .bind(period.end)
        .bind(farmer_ids)
        .fetch_all(executor)
        .await?;

        rows.into_iter()
            .map(|row| {
                let grade = row
                    .grade
                    .as_deref()
                    .and_then(QualityGrade::parse)
                    .ok_or_else(|| AppError::Internal(format!("Verified harvest {} has no grade", row.id)))?;
                Ok(PayableHarvest {
                    harvest_id: row.id,
                    farmer_id: row.farmer_id,
                    crop: row.crop,
                    grade,
                    weight_kg: row.weight_kg,
                    harvest_date: row.harvest_date,
                })
            })
            .collect()
    }

    async fn insert_payment(
        tx: &mut Transaction<'_, Postgres>,
        cooperative_id: Uuid,
        created_by: Uuid,
        period: DateRange,
        reference: &str,
        currency: &str,
        farmer: &FarmerPaymentSummary,
    ) -> AppResult<Uuid> {
        let payment_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO payments
                (cooperative_id, farmer_id, reference, period_start, period_end, total_weight_kg, amount, currency, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(cooperative_id)
        .bind(farmer.farmer_id)
        .bind(reference)
        .bind(period.start)
        .bind(period.end)
        .bind(farmer.total_weight_kg)
        .bind(farmer.amount)
        .bind(currency)
        .bind(created_by)
        .fetch_one(&mut **tx)
        .await?;

        for line in &farmer.lines {
            sqlx::query(
                r#"
                INSERT INTO payment_items (payment_id, harvest_id, crop, grade, weight_kg, harvest_date, unit_price, amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(payment_id)
            .bind(line.harvest_id)
            .bind(&line.crop)
            .bind(line.grade.as_str())
            .bind(line.weight_kg)
            .bind(line.harvest_date)
            .bind(line.unit_price)
            .bind(line.amount)
            .execute(&mut **tx)
            .await?;
        }

        let harvest_ids: Vec<Uuid> = farmer.lines.iter().map(|l| l.harvest_id).collect();
        sqlx::query("UPDATE harvests SET payment_id = $1, updated_at = NOW() WHERE id = ANY($2)")
            .bind(payment_id)
            .bind(&harvest_ids)
            .execute(&mut **tx)
            .await?;

        Ok(payment_id)
    }

    /// Resolve the run's period; the start defaults to the earliest possible day
    fn period(input: &PaymentRunInput) -> AppResult<DateRange> {
        let period = DateRange::from_bounds(input.period_start, Some(input.period_end));
        if !period.is_valid() {
            return Err(AppError::validation("period_start", "Period start must not be after period end"));
        }
        if matches!(input.farmer_ids.as_deref(), Some([])) {
            return Err(AppError::validation("farmer_ids", "Farmer list cannot be empty"));
        }
        Ok(period)
    }

    fn check_transaction_ref(method: PaymentMethod, transaction_ref: Option<&str>) -> AppResult<Option<&str>> {
        let transaction_ref = transaction_ref.map(str::trim).filter(|r| !r.is_empty());
        if method.requires_reference() && transaction_ref.is_none() {
            return Err(AppError::validation(
                "transaction_ref",
                format!("A transaction reference is required for {} payments", method.as_str()),
            ));
        }
        Ok(transaction_ref)
    }

    fn ensure_changed(rows: u64) -> AppResult<()> {
        if rows == 0 {
            Err(AppError::InvalidStateTransition(
                "Payment was changed by another request".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_period_defaults_start() {
        let input = PaymentRunInput {
            period_start: None,
            period_end: day(30),
            farmer_ids: None,
        };
        let period = PaymentService::period(&input).unwrap();
        assert_eq!(period.end, day(30));
        assert!(period.start < day(1));
    }

    #[test]
    fn test_period_rejects_inverted_range_and_empty_farmers() {
        let inverted = PaymentRunInput {
            period_start: Some(day(20)),
            period_end: day(10),
            farmer_ids: None,
        };
        assert!(PaymentService::period(&inverted).is_err());

        let no_farmers = PaymentRunInput {
            period_start: None,
            period_end: day(10),
            farmer_ids: Some(vec![]),
        };
        assert!(PaymentService::period(&no_farmers).is_err());
    }

    #[test]
    fn test_transaction_ref_rules() {
        assert_eq!(PaymentService::check_transaction_ref(PaymentMethod::Cash, None).unwrap(), None);
        assert!(PaymentService::check_transaction_ref(PaymentMethod::MobileMoney, Some("  ")).is_err());
        assert_eq!(
            PaymentService::check_transaction_ref(PaymentMethod::BankTransfer, Some(" TX-1 ")).unwrap(),
            Some("TX-1")
        );
    }

    #[test]
    fn test_open_period_reaches_old_harvests() {
        let input = PaymentRunInput {
            period_start: None,
            period_end: day(30),
            farmer_ids: None,
        };
        let period = PaymentService::period(&input).unwrap();
        assert!(period.contains(NaiveDate::from_ymd_opt(1998, 3, 14).unwrap()));
    }

    mod db {
        use super::*;
        use crate::services::test_support::*;
        use shared::UserRole;

        fn date(y: i32, m: u32, d: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(y, m, d).unwrap()
        }

        async fn payment_ids_of(pool: &PgPool, harvests: &[Uuid]) -> Vec<Option<Uuid>> {
            sqlx::query_scalar("SELECT payment_id FROM harvests WHERE id = ANY($1) ORDER BY id")
                .bind(harvests)
                .fetch_all(pool)
                .await
                .unwrap()
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn test_generate_cancel_regenerate() {
            let Some(pool) = test_pool("test_generate_cancel_regenerate").await else {
                return;
            };
            let coop = seed_cooperative(&pool).await;
            let finance = seed_staff(&pool, coop, UserRole::FinanceOfficer).await;
            let farmer = seed_farmer(&pool, coop).await;
            seed_price(&pool, coop, finance, QualityGrade::A, Decimal::new(5250, 2), date(1990, 1, 1)).await;

            let recent = seed_graded_harvest(&pool, coop, farmer, finance, QualityGrade::A, Decimal::from(100), date(2024, 6, 10)).await;
            // before 2000; an open period start must still reach it
            let old = seed_graded_harvest(&pool, coop, farmer, finance, QualityGrade::A, Decimal::new(1250, 1), date(1999, 6, 1)).await;
            let rejected = seed_graded_harvest(&pool, coop, farmer, finance, QualityGrade::Reject, Decimal::from(8), date(2024, 6, 11)).await;

            let service = PaymentService::new(pool.clone(), "KES");
            let input = PaymentRunInput {
                period_start: None,
                period_end: date(2024, 6, 30),
                farmer_ids: None,
            };

            let first = service.generate(coop, finance, &input).await.unwrap();
            assert_eq!(first.len(), 1);
            assert_eq!(first[0].amount, Decimal::new(590625, 2));
            assert_eq!(first[0].status, "pending");
            let detail = service.get_payment_detail(coop, first[0].id).await.unwrap();
            assert_eq!(detail.items.len(), 2);

            let harvests = [recent, old];
            assert!(payment_ids_of(&pool, &harvests).await.iter().all(|p| *p == Some(first[0].id)));
            assert_eq!(payment_ids_of(&pool, &[rejected]).await, vec![None]);

            assert!(matches!(
                service.generate(coop, finance, &input).await,
                Err(AppError::NothingEligible(_))
            ));

            let cancelled = service.cancel(coop, first[0].id).await.unwrap();
            assert_eq!(cancelled.status, "cancelled");
            assert!(payment_ids_of(&pool, &harvests).await.iter().all(Option::is_none));

            let second = service.generate(coop, finance, &input).await.unwrap();
            assert_eq!(second.len(), 1);
            assert_eq!(second[0].amount, first[0].amount);
            assert_ne!(second[0].reference, first[0].reference);
        }

        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn test_payments_stay_inside_their_cooperative() {
            let Some(pool) = test_pool("test_payments_stay_inside_their_cooperative").await else {
                return;
            };
            let coop = seed_cooperative(&pool).await;
            let other = seed_cooperative(&pool).await;
            let finance = seed_staff(&pool, coop, UserRole::FinanceOfficer).await;
            let other_finance = seed_staff(&pool, other, UserRole::FinanceOfficer).await;
            let farmer = seed_farmer(&pool, coop).await;
            seed_price(&pool, coop, finance, QualityGrade::B, Decimal::from(40), date(2024, 1, 1)).await;
            seed_graded_harvest(&pool, coop, farmer, finance, QualityGrade::B, Decimal::from(10), date(2024, 2, 1)).await;

            let service = PaymentService::new(pool.clone(), "KES");
            let input = PaymentRunInput {
                period_start: Some(date(2024, 1, 1)),
                period_end: date(2024, 12, 31),
                farmer_ids: None,
            };

            assert!(matches!(
                service.generate(other, other_finance, &input).await,
                Err(AppError::NothingEligible(_))
            ));

            let payments = service.generate(coop, finance, &input).await.unwrap();
            let id = payments[0].id;
            assert!(matches!(service.get_payment(other, id).await, Err(AppError::NotFound(_))));
            assert!(matches!(service.cancel(other, id).await, Err(AppError::NotFound(_))));
            assert!(service
                .list_payments(other, &PaymentFilter::default())
                .await
                .unwrap()
                .is_empty());
            assert_eq!(service.get_payment(coop, id).await.unwrap().status, "pending");
        }
    }
}
