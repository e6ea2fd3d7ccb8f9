//! Ingredient needs and costs for a month of brownie orders.
//!
//! One unit priced at 15 or more is a full brownie, anything cheaper is a
//! half. A batch of four brownies takes one egg, 55 g sugar, 55 g brown
//! sugar and 120 g maida.

use chrono::{Datelike, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{checked_sum, money};
use super::reports::validate_month;
use crate::errors::ServiceError;
use crate::models::{Order, OrderFilter, MAX_AMOUNT};
use crate::repositories::BakeryRepository;

const FULL_BROWNIE_MIN_PRICE: Decimal = dec!(15);
const BROWNIES_PER_BATCH: Decimal = dec!(4);
const SUGAR_KG_PER_BATCH: Decimal = dec!(0.055);
const BROWN_SUGAR_KG_PER_BATCH: Decimal = dec!(0.055);
const MAIDA_KG_PER_BATCH: Decimal = dec!(0.120);

fn ingredient_price(price: &Decimal) -> Result<(), ValidationError> {
    let message = if price.is_sign_negative() && !price.is_zero() {
        "Ingredient prices cannot be negative"
    } else if *price > MAX_AMOUNT {
        "Ingredient prices must not exceed 99999999.99"
    } else {
        return Ok(());
    };
    let mut err = ValidationError::new("price");
    err.message = Some(message.into());
    Err(err)
}

/// Month to cost and the ingredient prices to cost it at. Year and month
/// default to the current local month.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CostBreakdownRequest {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, max = 12, message = "Month must be between 1 and 12"))]
    pub month: Option<u32>,
    /// Per piece
    #[serde(default)]
    #[validate(custom = "ingredient_price")]
    #[schema(value_type = String, example = "7.00")]
    pub egg_price: Decimal,
    /// Per kg
    #[serde(default)]
    #[validate(custom = "ingredient_price")]
    #[schema(value_type = String, example = "45.00")]
    pub sugar_price: Decimal,
    /// Per kg
    #[serde(default)]
    #[validate(custom = "ingredient_price")]
    #[schema(value_type = String, example = "90.00")]
    pub brown_sugar_price: Decimal,
    /// Per kg
    #[serde(default)]
    #[validate(custom = "ingredient_price")]
    #[schema(value_type = String, example = "50.00")]
    pub maida_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct IngredientCost {
    #[schema(value_type = String)]
    pub quantity: Decimal,
    #[schema(example = "kg")]
    pub unit: String,
    #[schema(value_type = String)]
    pub price_per_unit: Decimal,
    #[schema(value_type = String)]
    pub total_cost: Decimal,
}

impl IngredientCost {
    fn new(
        quantity: Decimal,
        unit: &'static str,
        price_per_unit: Decimal,
    ) -> Result<Self, ServiceError> {
        let total_cost = quantity.checked_mul(price_per_unit).ok_or_else(|| {
            ServiceError::ValidationError("Ingredient cost is too large".to_string())
        })?;
        Ok(Self {
            quantity: quantity.normalize(),
            unit: unit.to_string(),
            price_per_unit,
            total_cost,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CostBreakdown {
    pub selected_year: i32,
    pub selected_month: u32,
    #[schema(example = "March 2024")]
    pub month_name: String,
    #[schema(value_type = String, example = "42.5")]
    pub total_brownies: Decimal,
    pub total_orders: usize,
    pub egg: IngredientCost,
    pub sugar: IngredientCost,
    pub brown_sugar: IngredientCost,
    pub maida: IngredientCost,
    #[schema(value_type = String)]
    pub total_cost: Decimal,
}

/// Brownies represented by one unit at `price`
pub fn brownies_per_unit(price: Decimal) -> Decimal {
    if price >= FULL_BROWNIE_MIN_PRICE {
        Decimal::ONE
    } else {
        dec!(0.5)
    }
}

pub fn breakdown(
    orders: &[Order],
    year: i32,
    month: u32,
    prices: &CostBreakdownRequest,
) -> Result<CostBreakdown, ServiceError> {
    let month_start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        ServiceError::ValidationError(format!("Invalid month {}-{}", year, month))
    })?;

    let total_brownies = checked_sum(
        orders
            .iter()
            .map(|o| brownies_per_unit(o.price) * Decimal::from(o.quantity)),
    )?;
    let batches = total_brownies / BROWNIES_PER_BATCH;

    let egg = IngredientCost::new(batches, "pieces", prices.egg_price)?;
    let sugar = IngredientCost::new(batches * SUGAR_KG_PER_BATCH, "kg", prices.sugar_price)?;
    let brown_sugar = IngredientCost::new(
        batches * BROWN_SUGAR_KG_PER_BATCH,
        "kg",
        prices.brown_sugar_price,
    )?;
    let maida = IngredientCost::new(batches * MAIDA_KG_PER_BATCH, "kg", prices.maida_price)?;
    let total_cost = checked_sum([
        egg.total_cost,
        sugar.total_cost,
        brown_sugar.total_cost,
        maida.total_cost,
    ])?;

    let rounded = |mut item: IngredientCost| {
        item.total_cost = money(item.total_cost);
        item
    };

    Ok(CostBreakdown {
        selected_year: year,
        selected_month: month,
        month_name: month_start.format("%B %Y").to_string(),
        total_brownies: total_brownies.normalize(),
        total_orders: orders.len(),
        egg: rounded(egg),
        sugar: rounded(sugar),
        brown_sugar: rounded(brown_sugar),
        maida: rounded(maida),
        total_cost: money(total_cost),
    })
}

#[derive(Clone)]
pub struct CostingService {
    repo: Arc<dyn BakeryRepository>,
    offset: FixedOffset,
}

impl CostingService {
    pub fn new(repo: Arc<dyn BakeryRepository>, offset: FixedOffset) -> Self {
        Self { repo, offset }
    }

    #[instrument(skip(self))]
    pub async fn calculate(&self, request: CostBreakdownRequest) -> Result<CostBreakdown, ServiceError> {
        request.validate()?;
        let today = Utc::now().with_timezone(&self.offset).date_naive();
        let year = request.year.unwrap_or_else(|| today.year());
        let month = request.month.unwrap_or_else(|| today.month());
        validate_month(month)?;

        let orders = self
            .repo
            .list_orders(&OrderFilter::for_month(year, month))
            .await?;
        breakdown(&orders, year, month, &request)
    }
}
