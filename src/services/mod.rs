//! Business rules over a [`BakeryRepository`]: validation, payment
//! normalisation, grouping and the report arithmetic.

pub mod costing;
pub mod orders;
pub mod reports;
pub mod shops;
pub mod varieties;

pub use costing::CostingService;
pub use orders::OrderService;
pub use reports::ReportService;
pub use shops::ShopService;
pub use varieties::VarietyService;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::models::Order;
use crate::repositories::BakeryRepository;

/// Label used when an order points at a variety or shop that no longer exists
pub const UNKNOWN_NAME: &str = "Unknown";

/// Rounds to paise and pins the scale so `50` renders as `50.00`.
pub fn money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

fn amount_overflow() -> ServiceError {
    ServiceError::InternalError("Order amounts are too large to total".to_string())
}

/// Adds `amount` to a running total, failing instead of overflowing.
pub fn accumulate(total: &mut Decimal, amount: Decimal) -> Result<(), ServiceError> {
    *total = total.checked_add(amount).ok_or_else(amount_overflow)?;
    Ok(())
}

/// Sums amounts, failing instead of overflowing.
pub fn checked_sum<I>(amounts: I) -> Result<Decimal, ServiceError>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or_else(amount_overflow)
}

/// Currency text used in confirmation messages
pub fn rupees(value: Decimal) -> String {
    format!("₹{}", money(value))
}

/// Id to name lookups for rendering orders
#[derive(Debug, Default)]
pub struct Directory {
    varieties: HashMap<i32, String>,
    shops: HashMap<i32, String>,
}

impl Directory {
    pub async fn load(repo: &dyn BakeryRepository) -> Result<Self, ServiceError> {
        let varieties = repo
            .list_varieties()
            .await?
            .into_iter()
            .map(|v| (v.id, v.name))
            .collect();
        let shops = repo
            .list_shops()
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();
        Ok(Self { varieties, shops })
    }

    pub fn variety_name(&self, id: i32) -> &str {
        self.varieties.get(&id).map_or(UNKNOWN_NAME, String::as_str)
    }

    pub fn shop_name(&self, id: i32) -> &str {
        self.shops.get(&id).map_or(UNKNOWN_NAME, String::as_str)
    }
}

/// An order with its names resolved and derived amounts filled in
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub variety_name: String,
    pub shop_name: String,
    #[schema(value_type = String, example = "50.00")]
    pub total: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub pending: Decimal,
}

impl OrderView {
    pub fn new(order: Order, names: &Directory) -> Self {
        Self {
            variety_name: names.variety_name(order.variety_id).to_string(),
            shop_name: names.shop_name(order.shop_id).to_string(),
            total: money(order.total()),
            pending: money(order.pending()),
            order,
        }
    }
}
