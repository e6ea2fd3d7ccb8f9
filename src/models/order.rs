use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::entities::order;
use crate::errors::ServiceError;

pub const PARTIAL_PAYMENT_ERROR: &str =
    "Partial payment amount must be greater than 0 and less than total amount";

/// Ceiling of the `decimal(10, 2)` price and payment columns
pub const MAX_AMOUNT: Decimal = dec!(99999999.99);

pub const AMOUNT_FORMAT_ERROR: &str =
    "Amounts must not exceed 99999999.99 or have more than 2 decimal places";

/// Checks that a price or payment fits a two-place currency column unchanged.
pub fn check_amount(value: Decimal) -> Result<Decimal, ServiceError> {
    if value.abs() > MAX_AMOUNT || value.normalize().scale() > 2 {
        return Err(ServiceError::ValidationError(
            AMOUNT_FORMAT_ERROR.to_string(),
        ));
    }
    Ok(value)
}

/// How much of an order has been settled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    #[default]
    Unpaid,
    Partial,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
            Self::Partial => "partial",
        }
    }

    /// Parses a stored or submitted status; anything unrecognised is `Unpaid`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paid" => Self::Paid,
            "partial" => Self::Partial,
            _ => Self::Unpaid,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies the payment rules to a requested status and amount.
///
/// `paid` settles the whole total, `unpaid` settles nothing, and `partial`
/// must carry an amount strictly between zero and the total.
pub fn normalize_payment(
    status: Option<&str>,
    paid_amount: Option<Decimal>,
    total: Decimal,
) -> Result<(PaymentStatus, Decimal), ServiceError> {
    let status = status
        .map(PaymentStatus::parse_lenient)
        .unwrap_or_default();

    match status {
        PaymentStatus::Paid => Ok((status, total)),
        PaymentStatus::Unpaid => Ok((status, Decimal::ZERO)),
        PaymentStatus::Partial => {
            let amount = paid_amount.unwrap_or(Decimal::ZERO);
            if amount <= Decimal::ZERO || amount >= total {
                return Err(ServiceError::ValidationError(
                    PARTIAL_PAYMENT_ERROR.to_string(),
                ));
            }
            Ok((status, amount))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i32,
    pub variety_id: i32,
    pub shop_id: i32,
    pub quantity: i32,
    /// Unit price
    #[schema(value_type = String, example = "25.00")]
    pub price: Decimal,
    #[schema(value_type = String, example = "2024-03-15")]
    pub delivery_date: NaiveDate,
    pub payment_status: PaymentStatus,
    #[schema(value_type = String, example = "0")]
    pub paid_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// `None` when price times quantity does not fit a `Decimal`
    pub fn checked_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }

    /// Stored prices are capped at [`MAX_AMOUNT`], which keeps this in range
    /// for any `i32` quantity.
    pub fn total(&self) -> Decimal {
        self.checked_total().unwrap_or(Decimal::MAX)
    }

    pub fn pending(&self) -> Decimal {
        self.total() - self.paid_amount
    }

    pub fn is_outstanding(&self) -> bool {
        self.pending() > Decimal::ZERO
    }

    /// The write that settles this order in full, keeping every other field.
    pub fn settled(&self) -> OrderWrite {
        OrderWrite {
            payment_status: PaymentStatus::Paid,
            paid_amount: self.total(),
            ..OrderWrite::from(self)
        }
    }
}

impl From<order::Model> for Order {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            variety_id: model.variety_id,
            shop_id: model.shop_id,
            quantity: model.quantity,
            price: model.price,
            delivery_date: model.delivery_date,
            payment_status: PaymentStatus::parse_lenient(&model.payment_status),
            paid_amount: model.paid_amount,
            created_at: model.created_at,
        }
    }
}

/// Field values for inserting or overwriting an order; payment already normalised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderWrite {
    pub variety_id: i32,
    pub shop_id: i32,
    pub quantity: i32,
    pub price: Decimal,
    pub delivery_date: NaiveDate,
    pub payment_status: PaymentStatus,
    pub paid_amount: Decimal,
}

impl From<&Order> for OrderWrite {
    fn from(order: &Order) -> Self {
        Self {
            variety_id: order.variety_id,
            shop_id: order.shop_id,
            quantity: order.quantity,
            price: order.price,
            delivery_date: order.delivery_date,
            payment_status: order.payment_status,
            paid_amount: order.paid_amount,
        }
    }
}

/// Narrows an order listing. `month` only applies together with `year`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub shop_id: Option<i32>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl OrderFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_shop(shop_id: i32) -> Self {
        Self {
            shop_id: Some(shop_id),
            ..Self::default()
        }
    }

    pub fn for_month(year: i32, month: u32) -> Self {
        Self {
            year: Some(year),
            month: Some(month),
            ..Self::default()
        }
    }

    /// Half-open `[start, end)` delivery-date window, when a period is set.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let year = self.year?;
        match self.month {
            Some(month) => {
                let start = NaiveDate::from_ymd_opt(year, month, 1)?;
                let end = if month == 12 {
                    NaiveDate::from_ymd_opt(year + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)?
                };
                Some((start, end))
            }
            None => Some((
                NaiveDate::from_ymd_opt(year, 1, 1)?,
                NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
            )),
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        if let Some(shop_id) = self.shop_id {
            if order.shop_id != shop_id {
                return false;
            }
        }
        if let Some(year) = self.year {
            if order.delivery_date.year() != year {
                return false;
            }
            if let Some(month) = self.month {
                if order.delivery_date.month() != month {
                    return false;
                }
            }
        }
        true
    }
}

/// Newest delivery first, then newest entry first.
pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.delivery_date
            .cmp(&a.delivery_date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}
