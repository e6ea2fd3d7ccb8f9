use axum::extract::{Path, State};

use super::common::{ok, ApiResponse, ApiResult};
use super::AppState;
use crate::services::reports::{ReportPeriods, SalesReport};

/// Years that have orders, plus today's month
#[utoipa::path(
    get,
    path = "/api/v1/reports/years",
    summary = "Report periods",
    responses(
        (status = 200, description = "Selectable report years", body = ApiResponse<ReportPeriods>),
    ),
    tag = "Reports"
)]
pub async fn report_years(State(state): State<AppState>) -> ApiResult<ReportPeriods> {
    ok(state.services.reports.periods().await?)
}

/// All-time sales report
#[utoipa::path(
    get,
    path = "/api/v1/reports/overall",
    summary = "Overall report",
    responses(
        (status = 200, description = "Totals and chart series over every order", body = ApiResponse<SalesReport>),
    ),
    tag = "Reports"
)]
pub async fn overall_report(State(state): State<AppState>) -> ApiResult<SalesReport> {
    ok(state.services.reports.overall().await?)
}

/// Sales report for one calendar month
#[utoipa::path(
    get,
    path = "/api/v1/reports/monthly/{year}/{month}",
    summary = "Monthly report",
    params(
        ("year" = i32, Path, description = "Delivery year"),
        ("month" = u32, Path, description = "Delivery month, 1-12"),
    ),
    responses(
        (status = 200, description = "Totals and chart series for the month", body = ApiResponse<SalesReport>),
        (status = 400, description = "Month outside 1-12", body = crate::errors::ErrorResponse),
    ),
    tag = "Reports"
)]
pub async fn monthly_report(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
) -> ApiResult<SalesReport> {
    ok(state.services.reports.monthly(year, month).await?)
}
