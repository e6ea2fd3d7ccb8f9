use axum::extract::{Json, Path, State};

use super::common::{created, ok, ok_with_message, ApiResponse, ApiResult, CreatedResult};
use super::AppState;
use crate::models::Variety;
use crate::services::varieties::VarietyRequest;

/// List varieties
#[utoipa::path(
    get,
    path = "/api/v1/varieties",
    summary = "List varieties",
    responses(
        (status = 200, description = "Varieties ordered by name", body = ApiResponse<Vec<Variety>>),
        (status = 502, description = "Spreadsheet API failure", body = crate::errors::ErrorResponse),
    ),
    tag = "Varieties"
)]
pub async fn list_varieties(State(state): State<AppState>) -> ApiResult<Vec<Variety>> {
    ok(state.services.varieties.list().await?)
}

/// Add a variety
#[utoipa::path(
    post,
    path = "/api/v1/varieties",
    summary = "Add variety",
    request_body = VarietyRequest,
    responses(
        (status = 201, description = "Variety added", body = ApiResponse<Variety>),
        (status = 400, description = "Missing name or non-positive price", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse),
    ),
    tag = "Varieties"
)]
pub async fn create_variety(
    State(state): State<AppState>,
    Json(request): Json<VarietyRequest>,
) -> CreatedResult<Variety> {
    let variety = state.services.varieties.create(request).await?;
    let message = format!("Variety \"{}\" added successfully", variety.name);
    created(variety, message)
}

/// Edit a variety
#[utoipa::path(
    put,
    path = "/api/v1/varieties/{id}",
    summary = "Update variety",
    params(("id" = i32, Path, description = "Variety id")),
    request_body = VarietyRequest,
    responses(
        (status = 200, description = "Variety updated", body = ApiResponse<Variety>),
        (status = 400, description = "Missing name or non-positive price", body = crate::errors::ErrorResponse),
        (status = 404, description = "Variety not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse),
    ),
    tag = "Varieties"
)]
pub async fn update_variety(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<VarietyRequest>,
) -> ApiResult<Variety> {
    let variety = state.services.varieties.update(id, request).await?;
    let message = format!("Variety \"{}\" updated successfully", variety.name);
    ok_with_message(variety, message)
}

/// Delete a variety and every order for it
#[utoipa::path(
    delete,
    path = "/api/v1/varieties/{id}",
    summary = "Delete variety",
    params(("id" = i32, Path, description = "Variety id")),
    responses(
        (status = 200, description = "Variety and its orders deleted", body = ApiResponse<Variety>),
        (status = 404, description = "Variety not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Varieties"
)]
pub async fn delete_variety(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Variety> {
    let variety = state.services.varieties.delete(id).await?;
    let message = format!("Variety \"{}\" deleted successfully", variety.name);
    ok_with_message(variety, message)
}
