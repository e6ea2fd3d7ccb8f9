#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use bakery_ledger::{
    build_repository, build_router,
    config::AppConfig,
    repositories::sheets::{MemorySheetsApi, SheetsRepository},
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Harness driving the full router over a throwaway store.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    /// Backing grid when running over the spreadsheet store
    pub sheets: Option<Arc<MemorySheetsApi>>,
}

fn test_config(database_url: &str) -> AppConfig {
    let mut cfg = AppConfig::new(
        database_url.to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.auto_migrate = true;
    // One connection so every query sees the same in-memory database
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg
}

impl TestApp {
    /// Application over a migrated in-memory SQLite database.
    pub async fn sql() -> Self {
        let cfg = test_config("sqlite::memory:");
        let repository = build_repository(&cfg)
            .await
            .expect("failed to open in-memory database");
        let state = AppState::new(repository, cfg);
        Self {
            router: build_router(state.clone()),
            state,
            sheets: None,
        }
    }

    /// Application over an in-process spreadsheet with headers written.
    pub async fn sheets() -> Self {
        let cfg = test_config("sqlite::memory:");
        let api = Arc::new(MemorySheetsApi::new());
        let repo = SheetsRepository::new(api.clone(), Duration::from_secs(300), cfg.local_offset());
        repo.initialize().await.expect("failed to write sheet headers");
        let state = AppState::new(Arc::new(repo), cfg);
        Self {
            router: build_router(state.clone()),
            state,
            sheets: Some(api),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_with_header(
        &self,
        method: Method,
        uri: &str,
        name: &str,
        value: &str,
    ) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(name, value)
            .body(Body::empty())
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request and decodes the JSON reply.
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    pub async fn add_variety(&self, name: &str, price: &str) -> i64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/varieties",
                Some(json!({ "name": name, "default_price": price })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_i64().expect("variety id")
    }

    pub async fn add_shop(&self, name: &str) -> i64 {
        let (status, body) = self
            .send(Method::POST, "/api/v1/shops", Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_i64().expect("shop id")
    }

    pub async fn add_order(&self, order: Value) -> Value {
        let (status, body) = self.send(Method::POST, "/api/v1/orders", Some(order)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response was not JSON")
    }
}

/// Decimal fields serialize as strings; compare them numerically.
pub fn amount(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().expect("numeric string"),
        Value::Number(n) => n.as_f64().expect("finite number"),
        other => panic!("not an amount: {other}"),
    }
}
