use axum::extract::{Json, Path, Query, State};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common::{created, ok, ok_with_message, ApiResponse, ApiResult, CreatedResult};
use super::AppState;
use crate::models::Order;
use crate::services::orders::{OrderHistory, OrderRequest, SettlementSummary};
use crate::services::{rupees, OrderView};

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryParams {
    /// Only orders for this shop
    pub shop_id: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedOrders {
    pub deleted: u64,
}

/// Order history grouped by month and delivery date
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "Order history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Orders grouped newest month first", body = ApiResponse<OrderHistory>),
        (status = 404, description = "Shop filter points at a missing shop", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn order_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<OrderHistory> {
    ok(state.services.orders.history(params.shop_id).await?)
}

/// Record an order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Add order",
    request_body = OrderRequest,
    responses(
        (status = 201, description = "Order added", body = ApiResponse<Order>),
        (status = 400, description = "Missing fields, bad amounts or bad date", body = crate::errors::ErrorResponse),
        (status = 404, description = "Variety or shop not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<OrderRequest>,
) -> CreatedResult<Order> {
    let order = state.services.orders.create(request).await?;
    let message = format!("Order added successfully! Total: {}", rupees(order.total()));
    created(order, message)
}

/// Fetch one order with names resolved
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderView>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<OrderView> {
    ok(state.services.orders.get(id).await?)
}

/// Overwrite an order; its creation time is kept
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    summary = "Edit order",
    params(("id" = i32, Path, description = "Order id")),
    request_body = OrderRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<Order>),
        (status = 400, description = "Invalid order fields", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order, variety or shop not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn edit_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<OrderRequest>,
) -> ApiResult<Order> {
    let order = state.services.orders.edit(id, request).await?;
    let message = format!("Order updated successfully! Total: {}", rupees(order.total()));
    ok_with_message(order, message)
}

/// Settle one order in full
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/mark-paid",
    summary = "Mark order paid",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order settled", body = ApiResponse<Order>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn mark_paid(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<Order> {
    let order = state.services.orders.mark_paid(id).await?;
    let message = format!("Order marked as paid! Amount: {}", rupees(order.total()));
    ok_with_message(order, message)
}

/// Settle every unpaid or partially paid order of a shop
#[utoipa::path(
    post,
    path = "/api/v1/shops/{id}/mark-all-paid",
    summary = "Mark shop orders paid",
    params(("id" = i32, Path, description = "Shop id")),
    responses(
        (status = 200, description = "Outstanding orders settled", body = ApiResponse<SettlementSummary>),
        (status = 404, description = "Shop not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn mark_all_paid(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<SettlementSummary> {
    let summary = state.services.orders.mark_all_paid(id).await?;
    let message = if summary.orders_marked == 0 {
        format!("All orders for {} are already paid!", summary.shop.name)
    } else {
        format!(
            "Marked {} order(s) as paid for {}! Total: {}",
            summary.orders_marked,
            summary.shop.name,
            rupees(summary.total)
        )
    };
    ok_with_message(summary, message)
}

/// Remove every order
#[utoipa::path(
    delete,
    path = "/api/v1/orders",
    summary = "Delete all orders",
    responses(
        (status = 200, description = "Orders deleted", body = ApiResponse<DeletedOrders>),
    ),
    tag = "Orders"
)]
pub async fn delete_all_orders(State(state): State<AppState>) -> ApiResult<DeletedOrders> {
    let deleted = state.services.orders.delete_all().await?;
    ok_with_message(
        DeletedOrders { deleted },
        format!("Successfully deleted {} order(s)", deleted),
    )
}
