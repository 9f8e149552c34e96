//! HTTP handlers for reporting endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::MonthlyReport;

use crate::error::AppResult;
use crate::services::ReportService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MonthlyReportQuery {
    /// Month as `YYYY-MM`; the current month when absent
    pub month: Option<String>,
}

/// Get the monthly report
pub async fn get_monthly_report(
    State(state): State<AppState>,
    Query(query): Query<MonthlyReportQuery>,
) -> AppResult<Json<MonthlyReport>> {
    let service = ReportService::new(state.store.clone(), state.clock.clone());
    let report = service.monthly(query.month.as_deref()).await?;
    Ok(Json(report))
}
