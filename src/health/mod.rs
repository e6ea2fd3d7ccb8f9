/*!
 * # Health Check Module
 *
 * - Liveness (`/health`): the process is up, and which store it runs on
 * - Readiness (`/health/ready`): the store answers a ping
 */

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::error;
use utoipa::ToSchema;

use crate::AppState;

static STARTED_AT: Lazy<SystemTime> = Lazy::new(SystemTime::now);

/// Pins the uptime origin; called when the router is built.
pub fn mark_started() {
    Lazy::force(&STARTED_AT);
}

fn uptime_seconds() -> u64 {
    SystemTime::now()
        .duration_since(*STARTED_AT)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthInfo {
    pub status: HealthStatus,
    /// `sql` or `sheets`
    pub backend: String,
    pub version: String,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthInfo {
    fn new(state: &AppState, status: HealthStatus, message: Option<String>) -> Self {
        Self {
            status,
            backend: state.repository.backend_name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime_seconds(),
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Liveness
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is running", body = HealthInfo)),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthInfo::new(&state, HealthStatus::Up, None))
}

/// Readiness: pings the database, or reads the shop sheet
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Store reachable", body = HealthInfo),
        (status = 503, description = "Store unreachable", body = HealthInfo),
    ),
    tag = "Health"
)]
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.repository.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthInfo::new(&state, HealthStatus::Up, None)),
        ),
        Err(e) => {
            error!(error = %e, backend = state.repository.backend_name(), "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthInfo::new(
                    &state,
                    HealthStatus::Down,
                    Some(e.response_message()),
                )),
            )
        }
    }
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
}
