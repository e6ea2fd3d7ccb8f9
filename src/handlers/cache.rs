use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::common::{ok_with_message, ApiResponse, ApiResult};
use super::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// Sheet to refresh; every sheet when absent
    #[serde(default)]
    #[schema(example = "Orders")]
    pub sheet: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshOutcome {
    pub refreshed: bool,
    pub backend: String,
}

/// Drop cached spreadsheet reads so the next request fetches fresh data
#[utoipa::path(
    post,
    path = "/api/v1/cache/refresh",
    summary = "Refresh spreadsheet cache",
    request_body(content = Option<RefreshRequest>, description = "Optional sheet name"),
    responses(
        (status = 200, description = "Cache dropped, or nothing to do for a SQL store", body = ApiResponse<RefreshOutcome>),
    ),
    tag = "Maintenance"
)]
pub async fn refresh_cache(
    State(state): State<AppState>,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<RefreshOutcome> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let refreshed = state
        .repository
        .refresh_cache(request.sheet.as_deref())
        .await?;

    let message = if refreshed {
        info!(sheet = ?request.sheet, "spreadsheet cache refreshed on request");
        "Cache refreshed successfully! The app will now fetch fresh data from Google Sheets."
    } else {
        "Cache refresh is only available when using Google Sheets"
    };

    ok_with_message(
        RefreshOutcome {
            refreshed,
            backend: state.repository.backend_name().to_string(),
        },
        message,
    )
}
