use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

use super::common::{ok, ApiResponse, ApiResult};
use super::AppState;
use crate::models::{Shop, Variety};

/// Choices for the quick order entry form
#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    pub varieties: Vec<Variety>,
    pub shops: Vec<Shop>,
    pub backend: String,
}

#[utoipa::path(
    get,
    path = "/",
    summary = "Dashboard",
    responses(
        (status = 200, description = "Varieties and shops ordered by name", body = ApiResponse<Dashboard>),
    ),
    tag = "Dashboard"
)]
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Dashboard> {
    let varieties = state.repository.list_varieties().await?;
    let shops = state.repository.list_shops().await?;
    ok(Dashboard {
        varieties,
        shops,
        backend: state.repository.backend_name().to_string(),
    })
}
