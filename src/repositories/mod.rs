//! Data access for varieties, shops and orders.
//!
//! [`BakeryRepository`] is implemented over a relational database
//! ([`sql::SqlRepository`]) and over a spreadsheet
//! ([`sheets::SheetsRepository`]); services only ever see the trait object.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

use crate::errors::ServiceError;
use crate::models::{Order, OrderFilter, OrderWrite, Shop, Variety};

pub mod sheets;
pub mod sql;

pub use sheets::SheetsRepository;
pub use sql::SqlRepository;

#[async_trait]
pub trait BakeryRepository: Send + Sync {
    /// Short backend label reported by the health check
    fn backend_name(&self) -> &'static str;

    /// Readiness check; stores without a cheaper one perform a read.
    async fn ping(&self) -> Result<(), ServiceError> {
        self.list_shops().await.map(|_| ())
    }

    /// All varieties ordered by name
    async fn list_varieties(&self) -> Result<Vec<Variety>, ServiceError>;
    async fn get_variety(&self, id: i32) -> Result<Option<Variety>, ServiceError>;
    async fn create_variety(
        &self,
        name: &str,
        default_price: Decimal,
    ) -> Result<Variety, ServiceError>;
    async fn update_variety(
        &self,
        id: i32,
        name: &str,
        default_price: Decimal,
    ) -> Result<Variety, ServiceError>;
    /// Removes the variety together with its orders
    async fn delete_variety(&self, id: i32) -> Result<(), ServiceError>;

    async fn find_variety_by_name(&self, name: &str) -> Result<Option<Variety>, ServiceError> {
        Ok(self
            .list_varieties()
            .await?
            .into_iter()
            .find(|v| v.name == name))
    }

    /// All shops ordered by name
    async fn list_shops(&self) -> Result<Vec<Shop>, ServiceError>;
    async fn get_shop(&self, id: i32) -> Result<Option<Shop>, ServiceError>;
    async fn create_shop(&self, name: &str) -> Result<Shop, ServiceError>;
    async fn update_shop(&self, id: i32, name: &str) -> Result<Shop, ServiceError>;
    /// Removes the shop together with its orders
    async fn delete_shop(&self, id: i32) -> Result<(), ServiceError>;

    /// Case-insensitive lookup with Unicode case folding, the same on every
    /// backend (SQLite's `LOWER()` only folds ASCII).
    async fn find_shop_by_name(&self, name: &str) -> Result<Option<Shop>, ServiceError> {
        let wanted = name.to_lowercase();
        Ok(self
            .list_shops()
            .await?
            .into_iter()
            .find(|s| s.name.to_lowercase() == wanted))
    }

    /// Orders matching `filter`, newest delivery date first
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError>;
    async fn get_order(&self, id: i32) -> Result<Option<Order>, ServiceError>;
    async fn create_order(&self, order: &OrderWrite) -> Result<Order, ServiceError>;
    /// Overwrites every field except `created_at`
    async fn update_order(&self, id: i32, order: &OrderWrite) -> Result<Order, ServiceError>;
    /// Returns how many orders were removed
    async fn delete_all_orders(&self) -> Result<u64, ServiceError>;

    /// Distinct delivery years, newest first
    async fn order_years(&self) -> Result<Vec<i32>, ServiceError> {
        use chrono::Datelike;

        let years: BTreeSet<i32> = self
            .list_orders(&OrderFilter::all())
            .await?
            .iter()
            .map(|o| o.delivery_date.year())
            .collect();
        Ok(years.into_iter().rev().collect())
    }

    /// Drops cached reads for one sheet, or all of them.
    ///
    /// Returns `false` when the backend keeps no cache.
    async fn refresh_cache(&self, _sheet: Option<&str>) -> Result<bool, ServiceError> {
        Ok(false)
    }
}

pub(crate) fn not_found(kind: &str, id: i32) -> ServiceError {
    ServiceError::NotFound(format!("{} with ID {} not found", kind, id))
}
