use axum::extract::{Json, State};

use super::common::{ok, ApiResponse, ApiResult};
use super::AppState;
use crate::services::costing::{CostBreakdown, CostBreakdownRequest};

/// Ingredient quantities and costs for a month of orders
#[utoipa::path(
    post,
    path = "/api/v1/cost-breakdown",
    summary = "Cost breakdown",
    request_body = CostBreakdownRequest,
    responses(
        (status = 200, description = "Ingredient needs and costs", body = ApiResponse<CostBreakdown>),
        (status = 400, description = "Bad month or negative price", body = crate::errors::ErrorResponse),
    ),
    tag = "Reports"
)]
pub async fn cost_breakdown(
    State(state): State<AppState>,
    Json(request): Json<CostBreakdownRequest>,
) -> ApiResult<CostBreakdown> {
    ok(state.services.costing.calculate(request).await?)
}
