//! Bakery Ledger
//!
//! Order, receivables and sales-report tracking for a home bakery. The same
//! services run over a SQL database or a spreadsheet, picked by configuration.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{middleware, routing::get, Router};
use http::HeaderValue;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};

use crate::config::{AppConfig, StorageBackend};
use crate::errors::ServiceError;
use crate::repositories::sheets::{HttpSheetsApi, SheetsRepository};
use crate::repositories::{BakeryRepository, SqlRepository};

pub use handlers::common::{ApiResponse, ApiResult, ResponseMeta};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn BakeryRepository>,
    pub config: Arc<AppConfig>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(repository: Arc<dyn BakeryRepository>, config: AppConfig) -> Self {
        let services = handlers::AppServices::new(repository.clone(), &config);
        Self {
            repository,
            config: Arc::new(config),
            services,
        }
    }
}

/// Opens the configured store: migrates a SQL database, or writes missing
/// sheet headers for a spreadsheet.
pub async fn build_repository(
    cfg: &AppConfig,
) -> Result<Arc<dyn BakeryRepository>, ServiceError> {
    match cfg.storage_backend {
        StorageBackend::Sql => {
            let pool = db::establish_connection_from_app_config(cfg).await?;
            if cfg.auto_migrate {
                db::run_migrations(&pool).await?;
            }
            Ok(Arc::new(SqlRepository::new(Arc::new(pool))))
        }
        StorageBackend::Sheets => {
            let api = Arc::new(HttpSheetsApi::new(&cfg.sheets)?);
            let repo = SheetsRepository::new(api, cfg.sheets.cache_ttl(), cfg.local_offset());
            repo.initialize().await?;
            Ok(Arc::new(repo))
        }
    }
}

/// CORS from `cors_allowed_origins`, permissive in development or when opted in.
pub fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}

/// Full application router: dashboard, `/api/v1`, health and Swagger UI.
pub fn build_router(state: AppState) -> Router {
    health::mark_started();
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(handlers::dashboard::dashboard))
        .nest("/api/v1", handlers::api_v1_routes())
        .merge(health::health_routes())
        .with_state(state)
        .merge(openapi::swagger_ui())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(crate::tracing::configure_http_tracing())
        .layer(middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}
