//! Reporting service for dashboards and data export
//! Provides role-aware dashboard metrics, delivery and payment reports

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::DateRange;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Operational metrics of one cooperative
#[derive(Debug, Serialize)]
pub struct CooperativeDashboard {
    pub cooperative_id: Uuid,
    pub active_farmers: i64,
    pub pending_harvests: i64,
    pub verified_unpaid_kg: Decimal,
    pub open_batches: i64,
    pub pending_payment_amount: Decimal,
    pub delivered_this_month_kg: Decimal,
    pub currency: String,
}

/// Platform-wide overview row, one per cooperative
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CooperativeOverview {
    pub cooperative_id: Uuid,
    pub name: String,
    pub code: String,
    pub is_active: bool,
    pub active_farmers: i64,
    pub delivered_this_month_kg: Decimal,
    pub paid_amount: Decimal,
}

/// Dashboard payload, depending on who is asking
#[derive(Debug, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Dashboard {
    Cooperative(CooperativeDashboard),
    Platform { cooperatives: Vec<CooperativeOverview> },
}

/// Delivered weight by crop, status and grade
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DeliveryReportRow {
    pub crop: String,
    pub status: String,
    pub grade: Option<String>,
    pub harvest_count: i64,
    pub total_weight_kg: Decimal,
}

/// Payment report row
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PaymentReportRow {
    pub reference: String,
    pub farmer_code: String,
    pub farmer_name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_weight_kg: Decimal,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub method: Option<String>,
    pub transaction_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Report filter parameters
#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportFilter {
    pub fn range(&self) -> AppResult<DateRange> {
        let range = DateRange::from_bounds(self.from, self.to);
        if range.is_valid() {
            Ok(range)
        } else {
            Err(AppError::validation("from", "Start date must not be after end date"))
        }
    }
}

/// First day of the month containing `day`
fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Metrics for a single cooperative
    pub async fn get_cooperative_dashboard(&self, cooperative_id: Uuid, currency: &str) -> AppResult<CooperativeDashboard> {
        let since = month_start(Utc::now().date_naive());

        let active_farmers: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM farmers WHERE cooperative_id = $1 AND is_active")
                .bind(cooperative_id)
                .fetch_one(&self.db)
                .await?;

        let (pending_harvests, verified_unpaid_kg, delivered_this_month_kg): (i64, Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending'),
                COALESCE(SUM(weight_kg) FILTER (WHERE status = 'verified' AND payment_id IS NULL), 0),
                COALESCE(SUM(weight_kg) FILTER (WHERE harvest_date >= $2), 0)
            FROM harvests
            WHERE cooperative_id = $1
            "#,
        )
        .bind(cooperative_id)
        .bind(since)
        .fetch_one(&self.db)
        .await?;

        let open_batches: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM batches WHERE cooperative_id = $1 AND status = 'open'")
                .bind(cooperative_id)
                .fetch_one(&self.db)
                .await?;

        // Amount committed but not yet paid out
        let pending_payment_amount: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0) FROM payments
            WHERE cooperative_id = $1 AND status IN ('pending', 'approved')
            "#,
        )
        .bind(cooperative_id)
        .fetch_one(&self.db)
        .await?;

        Ok(CooperativeDashboard {
            cooperative_id,
            active_farmers,
            pending_harvests,
            verified_unpaid_kg,
            open_batches,
            pending_payment_amount,
            delivered_this_month_kg,
            currency: currency.to_string(),
        })
    }

    /// Headline figures for every cooperative
    pub async fn get_platform_overview(&self) -> AppResult<Vec<CooperativeOverview>> {
        let since = month_start(Utc::now().date_naive());

        let rows = sqlx::query_as::<_, CooperativeOverview>(
            r#"
            SELECT
                c.id AS cooperative_id,
                c.name,
                c.code,
                c.is_active,
                (SELECT COUNT(*) FROM farmers f WHERE f.cooperative_id = c.id AND f.is_active) AS active_farmers,
                (SELECT COALESCE(SUM(h.weight_kg), 0) FROM harvests h
                  WHERE h.cooperative_id = c.id AND h.harvest_date >= $1) AS delivered_this_month_kg,
                (SELECT COALESCE(SUM(p.amount), 0) FROM payments p
                  WHERE p.cooperative_id = c.id AND p.status = 'paid') AS paid_amount
            FROM cooperatives c
            ORDER BY c.name
            "#,
        )
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Weight delivered in the range, by crop, status and grade
    pub async fn get_delivery_report(&self, cooperative_id: Uuid, filter: &ReportFilter) -> AppResult<Vec<DeliveryReportRow>> {
        let range = filter.range()?;

        let rows = sqlx::query_as::<_, DeliveryReportRow>(
            r#"
            SELECT crop, status, grade, COUNT(*) AS harvest_count, SUM(weight_kg) AS total_weight_kg
            FROM harvests
            WHERE cooperative_id = $1 AND harvest_date BETWEEN $2 AND $3
            GROUP BY crop, status, grade
            ORDER BY crop, status, grade NULLS FIRST
            "#,
        )
        .bind(cooperative_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Payments created in the range
    pub async fn get_payment_report(&self, cooperative_id: Uuid, filter: &ReportFilter) -> AppResult<Vec<PaymentReportRow>> {
        let range = filter.range()?;

        let rows = sqlx::query_as::<_, PaymentReportRow>(
            r#"
            SELECT p.reference, f.farmer_code, f.name AS farmer_name, p.period_start, p.period_end,
                   p.total_weight_kg, p.amount, p.currency, p.status, p.method, p.transaction_ref,
                   p.created_at, p.paid_at
            FROM payments p
            JOIN farmers f ON f.id = p.farmer_id
            WHERE p.cooperative_id = $1 AND p.created_at::date BETWEEN $2 AND $3
            ORDER BY p.created_at, p.reference
            "#,
        )
        .bind(cooperative_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_start() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(month_start(day), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_report_filter_range() {
        let filter = ReportFilter {
            from: NaiveDate::from_ymd_opt(2024, 3, 1),
            to: NaiveDate::from_ymd_opt(2024, 1, 1),
        };
        assert!(filter.range().is_err());
        assert!(ReportFilter::default().range().is_ok());
    }

    #[test]
    fn test_delivery_rows_export_to_csv() {
        let rows = vec![
            DeliveryReportRow {
                crop: "coffee".into(),
                status: "verified".into(),
                grade: Some("A".into()),
                harvest_count: 3,
                total_weight_kg: Decimal::new(12550, 2),
            },
            DeliveryReportRow {
                crop: "coffee".into(),
                status: "pending".into(),
                grade: None,
                harvest_count: 1,
                total_weight_kg: Decimal::from(40),
            },
        ];
        let csv = ReportingService::export_to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("crop,status,grade,harvest_count,total_weight_kg"));
        assert_eq!(lines.next(), Some("coffee,verified,A,3,125.50"));
        assert_eq!(lines.next(), Some("coffee,pending,,1,40"));
    }

    #[test]
    fn test_dashboard_is_tagged_by_scope() {
        let json = serde_json::to_value(Dashboard::Platform { cooperatives: vec![] }).unwrap();
        assert_eq!(json["scope"], "platform");
    }
}
