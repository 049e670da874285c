//! Dashboard and report handlers

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::{Action, Resource};

use crate::error::{AppError, AppResult};
use crate::middleware::{OptionalTenant, Tenant};
use crate::services::reporting::{Dashboard, ReportFilter, ReportingService};
use crate::AppState;

#[derive(Deserialize)]
pub struct ReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub format: Option<String>, // "json" or "csv"
}

impl ReportQuery {
    fn filter(&self) -> ReportFilter {
        ReportFilter {
            from: self.from,
            to: self.to,
        }
    }
}

/// Role-aware dashboard; a super-admin without a selected cooperative gets the platform overview
pub async fn get_dashboard(
    State(state): State<AppState>,
    tenant: OptionalTenant,
) -> AppResult<Json<Dashboard>> {
    // Every staff role sees the dashboard; farmers use the portal
    if !tenant
        .user
        .has_any_permission(&[(Resource::Report, Action::View), (Resource::Farmer, Action::View)])
    {
        return Err(AppError::InsufficientPermissions);
    }
    let service = ReportingService::new(state.db.clone());

    let dashboard = match tenant.cooperative_id {
        Some(cooperative_id) => Dashboard::Cooperative(
            service
                .get_cooperative_dashboard(cooperative_id, &state.config.payments.currency)
                .await?,
        ),
        None => Dashboard::Platform {
            cooperatives: service.get_platform_overview().await?,
        },
    };
    Ok(Json(dashboard))
}

/// Delivered weight by crop and grade
pub async fn get_delivery_report(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    tenant.user.require(Resource::Report, Action::View)?;
    let data = ReportingService::new(state.db.clone())
        .get_delivery_report(tenant.cooperative_id, &query.filter())
        .await?;
    respond(&tenant, query.format.as_deref(), "deliveries.csv", &data)
}

/// Payments created in a period
pub async fn get_payment_report(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    tenant.user.require(Resource::Report, Action::View)?;
    let data = ReportingService::new(state.db.clone())
        .get_payment_report(tenant.cooperative_id, &query.filter())
        .await?;
    respond(&tenant, query.format.as_deref(), "payments.csv", &data)
}

fn respond<T: Serialize>(tenant: &Tenant, format: Option<&str>, filename: &str, data: &[T]) -> AppResult<Response> {
    match format.unwrap_or("json") {
        "json" => Ok(Json(serde_json::json!({ "rows": data })).into_response()),
        "csv" => {
            tenant.user.require(Resource::Report, Action::Export)?;
            let csv = ReportingService::export_to_csv(data)?;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
                ],
                csv,
            )
                .into_response())
        }
        other => Err(AppError::validation("format", format!("Unsupported format '{}'", other))),
    }
}
