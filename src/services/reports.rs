use chrono::{Datelike, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::{accumulate, checked_sum, money, Directory};
use crate::errors::ServiceError;
use crate::models::{Order, OrderFilter};
use crate::repositories::BakeryRepository;

/// Chart series of sales per shop, largest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ShopSeries {
    pub labels: Vec<String>,
    #[schema(value_type = Vec<String>)]
    pub values: Vec<Decimal>,
    #[schema(value_type = Vec<String>)]
    pub pending: Vec<Decimal>,
}

/// Chart series of sales per variety, largest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct VarietySeries {
    pub labels: Vec<String>,
    #[schema(value_type = Vec<String>)]
    pub values: Vec<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SalesReport {
    #[schema(value_type = String, example = "1250.00")]
    pub total_sales: Decimal,
    #[schema(value_type = String)]
    pub total_paid: Decimal,
    #[schema(value_type = String)]
    pub total_pending: Decimal,
    /// Estimated profit at the configured margin rate
    #[schema(value_type = String, example = "375.00")]
    pub margin: Decimal,
    pub shop_data: ShopSeries,
    pub variety_data: VarietySeries,
    pub total_orders: usize,
    #[schema(value_type = String)]
    pub avg_order_value: Decimal,
}

/// Report periods a user can pick from
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportPeriods {
    /// Delivery years with orders, newest first; the current year when empty
    pub available_years: Vec<i32>,
    pub current_year: i32,
    pub current_month: u32,
}

#[derive(Clone)]
pub struct ReportService {
    repo: Arc<dyn BakeryRepository>,
    margin_rate: Decimal,
    offset: FixedOffset,
}

impl ReportService {
    pub fn new(repo: Arc<dyn BakeryRepository>, margin_rate: Decimal, offset: FixedOffset) -> Self {
        Self {
            repo,
            margin_rate,
            offset,
        }
    }

    pub async fn periods(&self) -> Result<ReportPeriods, ServiceError> {
        let today = Utc::now().with_timezone(&self.offset).date_naive();
        let mut years = self.repo.order_years().await?;
        if years.is_empty() {
            years.push(today.year());
        }
        Ok(ReportPeriods {
            available_years: years,
            current_year: today.year(),
            current_month: today.month(),
        })
    }

    #[instrument(skip(self))]
    pub async fn overall(&self) -> Result<SalesReport, ServiceError> {
        self.report(OrderFilter::all()).await
    }

    #[instrument(skip(self))]
    pub async fn monthly(&self, year: i32, month: u32) -> Result<SalesReport, ServiceError> {
        validate_month(month)?;
        self.report(OrderFilter::for_month(year, month)).await
    }

    async fn report(&self, filter: OrderFilter) -> Result<SalesReport, ServiceError> {
        let orders = self.repo.list_orders(&filter).await?;
        let names = Directory::load(self.repo.as_ref()).await?;
        summarize(&orders, &names, self.margin_rate)
    }
}

pub(crate) fn validate_month(month: u32) -> Result<(), ServiceError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(
            "Month must be between 1 and 12".to_string(),
        ))
    }
}

/// Orders by summed total, largest first; ties fall back to the label.
fn ranked<T>(groups: HashMap<String, T>, total: impl Fn(&T) -> Decimal) -> Vec<(String, T)> {
    let mut ranked: Vec<(String, T)> = groups.into_iter().collect();
    ranked.sort_by(|(a_name, a), (b_name, b)| {
        total(b).cmp(&total(a)).then_with(|| a_name.cmp(b_name))
    });
    ranked
}

pub fn summarize(
    orders: &[Order],
    names: &Directory,
    margin_rate: Decimal,
) -> Result<SalesReport, ServiceError> {
    let total_sales = checked_sum(orders.iter().map(Order::total))?;
    let total_paid = checked_sum(orders.iter().map(|o| o.paid_amount))?;

    // Grouped by name so dangling references collapse into one "Unknown" entry
    let mut by_shop: HashMap<String, (Decimal, Decimal)> = HashMap::new();
    let mut by_variety: HashMap<String, Decimal> = HashMap::new();
    for order in orders {
        let shop = by_shop
            .entry(names.shop_name(order.shop_id).to_string())
            .or_default();
        accumulate(&mut shop.0, order.total())?;
        accumulate(&mut shop.1, order.paid_amount)?;
        let variety = by_variety
            .entry(names.variety_name(order.variety_id).to_string())
            .or_default();
        accumulate(variety, order.total())?;
    }

    let mut shop_data = ShopSeries::default();
    for (name, (total, paid)) in ranked(by_shop, |(total, _)| *total) {
        shop_data.labels.push(name);
        shop_data.values.push(money(total));
        shop_data.pending.push(money(total - paid));
    }

    let mut variety_data = VarietySeries::default();
    for (name, total) in ranked(by_variety, |total| *total) {
        variety_data.labels.push(name);
        variety_data.values.push(money(total));
    }

    let avg_order_value = if orders.is_empty() {
        Decimal::ZERO
    } else {
        total_sales / Decimal::from(orders.len())
    };

    let margin = total_sales.checked_mul(margin_rate).ok_or_else(|| {
        ServiceError::InternalError("Order amounts are too large to total".to_string())
    })?;

    Ok(SalesReport {
        total_sales: money(total_sales),
        total_paid: money(total_paid),
        total_pending: money(total_sales - total_paid),
        margin: money(margin),
        shop_data,
        variety_data,
        total_orders: orders.len(),
        avg_order_value: money(avg_order_value),
    })
}
