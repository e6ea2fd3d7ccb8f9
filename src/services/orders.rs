use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::{accumulate, checked_sum, money, Directory, OrderView};
use crate::errors::ServiceError;
use crate::models::order::AMOUNT_FORMAT_ERROR;
use crate::models::{check_amount, normalize_payment, Order, OrderFilter, OrderWrite, Shop};
use crate::repositories::{not_found, BakeryRepository};

/// Body for adding or editing an order. Every field is optional so that
/// missing values produce the same message as blank ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct OrderRequest {
    #[serde(default)]
    pub variety_id: Option<i32>,
    #[serde(default)]
    pub shop_id: Option<i32>,
    #[serde(default)]
    pub quantity: Option<i32>,
    /// Unit price
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "25.00")]
    pub price: Option<Decimal>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    #[schema(example = "2024-03-15")]
    pub delivery_date: Option<String>,
    /// `paid`, `unpaid` or `partial`; anything else counts as `unpaid`
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "20.00")]
    pub paid_amount: Option<Decimal>,
}

impl OrderRequest {
    /// Field checks that need no lookups, in the order users see them
    fn validated(&self) -> Result<OrderWrite, ServiceError> {
        let required = (
            self.variety_id.filter(|v| *v != 0),
            self.shop_id.filter(|v| *v != 0),
            self.quantity.filter(|v| *v != 0),
            self.price.filter(|v| !v.is_zero()),
            self.delivery_date
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty()),
        );
        let (Some(variety_id), Some(shop_id), Some(quantity), Some(price), Some(date)) = required
        else {
            return Err(ServiceError::ValidationError(
                "All fields are required".to_string(),
            ));
        };

        if quantity <= 0 || price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Quantity and price must be positive numbers".to_string(),
            ));
        }

        let price = check_amount(price)?;
        let offered = self.paid_amount.map(check_amount).transpose()?;
        let total = price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| ServiceError::ValidationError(AMOUNT_FORMAT_ERROR.to_string()))?;
        let (payment_status, paid_amount) =
            normalize_payment(self.payment_status.as_deref(), offered, total)?;

        let delivery_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| ServiceError::ValidationError("Invalid date format".to_string()))?;

        Ok(OrderWrite {
            variety_id,
            shop_id,
            quantity,
            price,
            delivery_date,
            payment_status,
            paid_amount,
        })
    }
}

/// Orders sharing a delivery date
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DateGroup {
    #[schema(value_type = String, example = "2024-03-15")]
    pub date: NaiveDate,
    pub orders: Vec<OrderView>,
    #[schema(value_type = String)]
    pub total: Decimal,
    #[schema(value_type = String)]
    pub pending: Decimal,
}

/// Orders delivered within one calendar month
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonthGroup {
    /// `YYYY-MM`
    #[schema(example = "2024-03")]
    pub key: String,
    #[schema(example = "March 2024")]
    pub label: String,
    /// Newest date first
    pub dates: Vec<DateGroup>,
    #[schema(value_type = String)]
    pub total: Decimal,
    #[schema(value_type = String)]
    pub pending: Decimal,
    pub order_count: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderHistory {
    /// The shop the history was narrowed to
    pub shop: Option<Shop>,
    /// Newest month first
    pub months: Vec<MonthGroup>,
    #[schema(value_type = String)]
    pub total_sales: Decimal,
    #[schema(value_type = String)]
    pub total_pending: Decimal,
    pub total_orders: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BillLine {
    #[serde(flatten)]
    pub view: OrderView,
    #[schema(value_type = String)]
    pub paid: Decimal,
}

/// Outstanding orders of one shop
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShopBill {
    pub shop: Shop,
    /// Newest delivery first
    pub orders: Vec<BillLine>,
    #[schema(value_type = String)]
    pub total_pending: Decimal,
    #[schema(value_type = String, example = "2024-03-31T18:45:00+05:30")]
    pub bill_date: DateTime<FixedOffset>,
}

/// Result of settling a shop's outstanding orders
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettlementSummary {
    pub shop: Shop,
    pub orders_marked: usize,
    /// Sum of the settled orders' totals
    #[schema(value_type = String)]
    pub total: Decimal,
}

#[derive(Clone)]
pub struct OrderService {
    repo: Arc<dyn BakeryRepository>,
    offset: FixedOffset,
}

impl OrderService {
    pub fn new(repo: Arc<dyn BakeryRepository>, offset: FixedOffset) -> Self {
        Self { repo, offset }
    }

    async fn ensure_references(&self, write: &OrderWrite) -> Result<(), ServiceError> {
        if self.repo.get_variety(write.variety_id).await?.is_none() {
            return Err(not_found("Variety", write.variety_id));
        }
        if self.repo.get_shop(write.shop_id).await?.is_none() {
            return Err(not_found("Shop", write.shop_id));
        }
        Ok(())
    }

    async fn shop(&self, shop_id: i32) -> Result<Shop, ServiceError> {
        self.repo
            .get_shop(shop_id)
            .await?
            .ok_or_else(|| not_found("Shop", shop_id))
    }

    async fn order(&self, id: i32) -> Result<Order, ServiceError> {
        self.repo
            .get_order(id)
            .await?
            .ok_or_else(|| not_found("Order", id))
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: OrderRequest) -> Result<Order, ServiceError> {
        let write = request.validated()?;
        self.ensure_references(&write).await?;
        let order = self.repo.create_order(&write).await?;
        info!(
            order_id = order.id,
            shop_id = order.shop_id,
            status = %order.payment_status,
            "order added"
        );
        Ok(order)
    }

    pub async fn get(&self, id: i32) -> Result<OrderView, ServiceError> {
        let order = self.order(id).await?;
        let names = Directory::load(self.repo.as_ref()).await?;
        Ok(OrderView::new(order, &names))
    }

    #[instrument(skip(self, request))]
    pub async fn edit(&self, id: i32, request: OrderRequest) -> Result<Order, ServiceError> {
        self.order(id).await?;
        let write = request.validated()?;
        self.ensure_references(&write).await?;
        self.repo.update_order(id, &write).await
    }

    /// Settles one order in full
    #[instrument(skip(self))]
    pub async fn mark_paid(&self, id: i32) -> Result<Order, ServiceError> {
        let order = self.order(id).await?;
        let settled = self.repo.update_order(id, &order.settled()).await?;
        info!(order_id = id, amount = %settled.paid_amount, "order marked paid");
        Ok(settled)
    }

    /// Settles every outstanding order of a shop; zero orders when nothing is owed.
    #[instrument(skip(self))]
    pub async fn mark_all_paid(&self, shop_id: i32) -> Result<SettlementSummary, ServiceError> {
        let shop = self.shop(shop_id).await?;
        let outstanding: Vec<Order> = self
            .repo
            .list_orders(&OrderFilter::for_shop(shop_id))
            .await?
            .into_iter()
            .filter(Order::is_outstanding)
            .collect();

        let mut total = Decimal::ZERO;
        for order in &outstanding {
            self.repo.update_order(order.id, &order.settled()).await?;
            accumulate(&mut total, order.total())?;
        }
        if !outstanding.is_empty() {
            info!(shop_id, orders = outstanding.len(), %total, "shop orders marked paid");
        }

        Ok(SettlementSummary {
            shop,
            orders_marked: outstanding.len(),
            total: money(total),
        })
    }

    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<u64, ServiceError> {
        let count = self.repo.delete_all_orders().await?;
        warn!(count, "all orders deleted");
        Ok(count)
    }

    /// All orders, optionally for one shop, grouped by month then by date.
    #[instrument(skip(self))]
    pub async fn history(&self, shop_id: Option<i32>) -> Result<OrderHistory, ServiceError> {
        let (shop, filter) = match shop_id {
            Some(id) => (Some(self.shop(id).await?), OrderFilter::for_shop(id)),
            None => (None, OrderFilter::all()),
        };
        let orders = self.repo.list_orders(&filter).await?;
        let names = Directory::load(self.repo.as_ref()).await?;
        group_history(shop, orders, &names)
    }

    /// What a shop still owes, newest delivery first
    #[instrument(skip(self))]
    pub async fn shop_bill(&self, shop_id: i32) -> Result<ShopBill, ServiceError> {
        let shop = self.shop(shop_id).await?;
        let names = Directory::load(self.repo.as_ref()).await?;
        let orders = self
            .repo
            .list_orders(&OrderFilter::for_shop(shop_id))
            .await?;

        let mut total_pending = Decimal::ZERO;
        let mut lines = Vec::new();
        for order in orders.into_iter().filter(Order::is_outstanding) {
            accumulate(&mut total_pending, order.pending())?;
            lines.push(BillLine {
                paid: money(order.paid_amount),
                view: OrderView::new(order, &names),
            });
        }

        Ok(ShopBill {
            shop,
            orders: lines,
            total_pending: money(total_pending),
            bill_date: Utc::now().with_timezone(&self.offset),
        })
    }
}

/// Groups orders already sorted newest first; both levels come out newest first.
fn group_history(
    shop: Option<Shop>,
    orders: Vec<Order>,
    names: &Directory,
) -> Result<OrderHistory, ServiceError> {
    let total_orders = orders.len();
    let mut total_sales = Decimal::ZERO;
    let mut total_pending = Decimal::ZERO;
    let mut months: BTreeMap<String, BTreeMap<NaiveDate, Vec<Order>>> = BTreeMap::new();

    for order in orders {
        accumulate(&mut total_sales, order.total())?;
        accumulate(&mut total_pending, order.pending())?;
        months
            .entry(order.delivery_date.format("%Y-%m").to_string())
            .or_default()
            .entry(order.delivery_date)
            .or_default()
            .push(order);
    }

    let mut grouped = Vec::with_capacity(months.len());
    for (key, dates) in months.into_iter().rev() {
        let mut month_total = Decimal::ZERO;
        let mut month_pending = Decimal::ZERO;
        let mut order_count = 0;
        let label = dates
            .keys()
            .next()
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_default();

        let mut date_groups = Vec::with_capacity(dates.len());
        for (date, orders) in dates.into_iter().rev() {
            let total = checked_sum(orders.iter().map(Order::total))?;
            let pending = checked_sum(orders.iter().map(Order::pending))?;
            accumulate(&mut month_total, total)?;
            accumulate(&mut month_pending, pending)?;
            order_count += orders.len();
            date_groups.push(DateGroup {
                date,
                orders: orders
                    .into_iter()
                    .map(|o| OrderView::new(o, names))
                    .collect(),
                total: money(total),
                pending: money(pending),
            });
        }

        grouped.push(MonthGroup {
            key,
            label,
            dates: date_groups,
            total: money(month_total),
            pending: money(month_pending),
            order_count,
        });
    }

    Ok(OrderHistory {
        shop,
        months: grouped,
        total_sales: money(total_sales),
        total_pending: money(total_pending),
        total_orders,
    })
}
