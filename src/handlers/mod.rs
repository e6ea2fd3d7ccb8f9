pub mod cache;
pub mod common;
pub mod costing;
pub mod dashboard;
pub mod orders;
pub mod reports;
pub mod shops;
pub mod varieties;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::repositories::BakeryRepository;
use crate::services::{CostingService, OrderService, ReportService, ShopService, VarietyService};

// Handler modules import AppState from here
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub varieties: Arc<VarietyService>,
    pub shops: Arc<ShopService>,
    pub orders: Arc<OrderService>,
    pub reports: Arc<ReportService>,
    pub costing: Arc<CostingService>,
}

impl AppServices {
    pub fn new(repo: Arc<dyn BakeryRepository>, config: &AppConfig) -> Self {
        let offset = config.local_offset();
        Self {
            varieties: Arc::new(VarietyService::new(repo.clone())),
            shops: Arc::new(ShopService::new(repo.clone())),
            orders: Arc::new(OrderService::new(repo.clone(), offset)),
            reports: Arc::new(ReportService::new(repo.clone(), config.margin_rate, offset)),
            costing: Arc::new(CostingService::new(repo, offset)),
        }
    }
}

/// Everything under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/varieties",
            get(varieties::list_varieties).post(varieties::create_variety),
        )
        .route(
            "/varieties/:id",
            put(varieties::update_variety).delete(varieties::delete_variety),
        )
        .route("/shops", get(shops::list_shops).post(shops::create_shop))
        .route(
            "/shops/:id",
            put(shops::update_shop).delete(shops::delete_shop),
        )
        .route("/shops/:id/bill", get(shops::shop_bill))
        .route("/shops/:id/mark-all-paid", post(orders::mark_all_paid))
        .route(
            "/orders",
            get(orders::order_history)
                .post(orders::create_order)
                .delete(orders::delete_all_orders),
        )
        .route("/orders/:id", get(orders::get_order).put(orders::edit_order))
        .route("/orders/:id/mark-paid", post(orders::mark_paid))
        .route("/reports/years", get(reports::report_years))
        .route("/reports/overall", get(reports::overall_report))
        .route("/reports/monthly/:year/:month", get(reports::monthly_report))
        .route("/cost-breakdown", post(costing::cost_breakdown))
        .route("/cache/refresh", post(cache::refresh_cache))
}
