use axum::extract::{Json, Path, State};

use super::common::{created, ok, ok_with_message, ApiResponse, ApiResult, CreatedResult};
use super::AppState;
use crate::models::Shop;
use crate::services::orders::ShopBill;
use crate::services::shops::{ShopBalance, ShopRequest};

/// List shops with what each still owes
#[utoipa::path(
    get,
    path = "/api/v1/shops",
    summary = "List shops",
    responses(
        (status = 200, description = "Shops ordered by name with pending totals", body = ApiResponse<Vec<ShopBalance>>),
    ),
    tag = "Shops"
)]
pub async fn list_shops(State(state): State<AppState>) -> ApiResult<Vec<ShopBalance>> {
    ok(state.services.shops.list_with_pending().await?)
}

/// Add a shop/customer
#[utoipa::path(
    post,
    path = "/api/v1/shops",
    summary = "Add shop",
    request_body = ShopRequest,
    responses(
        (status = 201, description = "Shop added", body = ApiResponse<Shop>),
        (status = 400, description = "Name missing", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken (case-insensitive)", body = crate::errors::ErrorResponse),
    ),
    tag = "Shops"
)]
pub async fn create_shop(
    State(state): State<AppState>,
    Json(request): Json<ShopRequest>,
) -> CreatedResult<Shop> {
    let shop = state.services.shops.create(request).await?;
    let message = format!("Shop/Customer \"{}\" added successfully", shop.name);
    created(shop, message)
}

/// Rename a shop/customer
#[utoipa::path(
    put,
    path = "/api/v1/shops/{id}",
    summary = "Update shop",
    params(("id" = i32, Path, description = "Shop id")),
    request_body = ShopRequest,
    responses(
        (status = 200, description = "Shop updated", body = ApiResponse<Shop>),
        (status = 404, description = "Shop not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse),
    ),
    tag = "Shops"
)]
pub async fn update_shop(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<ShopRequest>,
) -> ApiResult<Shop> {
    let shop = state.services.shops.update(id, request).await?;
    let message = format!("Shop/Customer \"{}\" updated successfully", shop.name);
    ok_with_message(shop, message)
}

/// Delete a shop/customer and every order placed by it
#[utoipa::path(
    delete,
    path = "/api/v1/shops/{id}",
    summary = "Delete shop",
    params(("id" = i32, Path, description = "Shop id")),
    responses(
        (status = 200, description = "Shop and its orders deleted", body = ApiResponse<Shop>),
        (status = 404, description = "Shop not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Shops"
)]
pub async fn delete_shop(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<Shop> {
    let shop = state.services.shops.delete(id).await?;
    let message = format!("Shop/Customer \"{}\" deleted successfully", shop.name);
    ok_with_message(shop, message)
}

/// Outstanding orders of a shop, ready to print
#[utoipa::path(
    get,
    path = "/api/v1/shops/{id}/bill",
    summary = "Shop bill",
    params(("id" = i32, Path, description = "Shop id")),
    responses(
        (status = 200, description = "Unpaid and partially paid orders", body = ApiResponse<ShopBill>),
        (status = 404, description = "Shop not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Shops"
)]
pub async fn shop_bill(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<ShopBill> {
    ok(state.services.orders.shop_bill(id).await?)
}
