//! Spreadsheet-backed store.
//!
//! Each entity lives on its own sheet with a header in row 1; an entity's id
//! is the 1-based row number it occupies. Deletes blank the row instead of
//! removing it, so the ids of later rows never shift.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SubsecRound, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{not_found, BakeryRepository};
use crate::cache::TtlCache;
use crate::errors::ServiceError;
use crate::models::order::sort_newest_first;
use crate::models::{Order, OrderFilter, OrderWrite, PaymentStatus, Shop, Variety, MAX_AMOUNT};

pub mod api;
pub mod http;

pub use api::{MemorySheetsApi, Rows, SheetsApi};
pub use http::HttpSheetsApi;

pub const VARIETIES_SHEET: &str = "Varieties";
pub const SHOPS_SHEET: &str = "Shops";
pub const ORDERS_SHEET: &str = "Orders";

const VARIETY_HEADERS: [&str; 2] = ["Name", "Default Price"];
const SHOP_HEADERS: [&str; 1] = ["Name"];
const ORDER_HEADERS: [&str; 8] = [
    "Variety ID",
    "Shop ID",
    "Quantity",
    "Price",
    "Delivery Date",
    "Payment Status",
    "Paid Amount",
    "Created At",
];

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Last column letter for a sheet with `width` columns (at most 26)
fn last_column(width: usize) -> char {
    (b'A' + (width.clamp(1, 26) as u8) - 1) as char
}

fn row_range(sheet: &str, width: usize, row: i32) -> String {
    format!("{}!A{}:{}{}", sheet, row, last_column(width), row)
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|c| c.trim()).unwrap_or("")
}

/// Accepts `1,250.50`, `₹25` and plain numbers. Amounts beyond
/// [`MAX_AMOUNT`] are treated as unreadable.
fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '₹' | ' '))
        .collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
        .filter(|value| value.abs() <= MAX_AMOUNT)
}

/// Integer cells may come back as `5.0`
fn parse_int(raw: &str) -> Option<i32> {
    let cleaned = raw.trim().replace(',', "");
    cleaned.parse::<i32>().ok().or_else(|| {
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f as i32)
    })
}

fn parse_variety(row_num: i32, row: &[String]) -> Option<Variety> {
    let name = cell(row, 0);
    if name.is_empty() {
        return None;
    }
    let Some(default_price) = parse_decimal(cell(row, 1)) else {
        warn!(row = row_num, "skipping variety row with unreadable price");
        return None;
    };
    Some(Variety {
        id: row_num,
        name: name.to_string(),
        default_price,
        created_at: None,
    })
}

fn parse_shop(row_num: i32, row: &[String]) -> Option<Shop> {
    let name = cell(row, 0);
    if name.is_empty() {
        return None;
    }
    Some(Shop {
        id: row_num,
        name: name.to_string(),
        created_at: None,
    })
}

fn parse_order(row_num: i32, row: &[String], offset: &FixedOffset) -> Option<Order> {
    if row.iter().all(|c| c.trim().is_empty()) {
        return None;
    }
    if row.len() < ORDER_HEADERS.len() {
        warn!(row = row_num, cells = row.len(), "skipping incomplete order row");
        return None;
    }

    let parsed = (|| {
        let variety_id = parse_int(cell(row, 0))?;
        let shop_id = parse_int(cell(row, 1))?;
        let quantity = match cell(row, 2) {
            "" => 0,
            raw => parse_int(raw)?,
        };
        let price = match cell(row, 3) {
            "" => Decimal::ZERO,
            raw => parse_decimal(raw)?,
        };
        let delivery_date = NaiveDate::parse_from_str(cell(row, 4), DATE_FORMAT).ok()?;
        let payment_status = PaymentStatus::parse_lenient(cell(row, 5));
        let paid_amount = match cell(row, 6) {
            "" => Decimal::ZERO,
            raw => parse_decimal(raw)?,
        };
        let created_at = match cell(row, 7) {
            "" => Utc::now(),
            raw => {
                let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()?;
                offset
                    .from_local_datetime(&naive)
                    .single()?
                    .with_timezone(&Utc)
            }
        };
        Some(Order {
            id: row_num,
            variety_id,
            shop_id,
            quantity,
            price,
            delivery_date,
            payment_status,
            paid_amount,
            created_at,
        })
    })();

    if parsed.is_none() {
        warn!(row = row_num, "skipping unreadable order row");
    }
    parsed
}

/// Enumerates data rows with their sheet row numbers, header skipped
fn data_rows(rows: &Rows) -> impl Iterator<Item = (i32, &Vec<String>)> {
    rows.iter()
        .enumerate()
        .skip(1)
        .map(|(idx, row)| (idx as i32 + 1, row))
}

fn decimal_cell(value: Decimal) -> String {
    value.normalize().to_string()
}

pub struct SheetsRepository {
    api: Arc<dyn SheetsApi>,
    cache: TtlCache<Rows>,
    offset: FixedOffset,
    write_lock: Mutex<()>,
}

impl SheetsRepository {
    pub fn new(api: Arc<dyn SheetsApi>, cache_ttl: Duration, offset: FixedOffset) -> Self {
        Self {
            api,
            cache: TtlCache::new(cache_ttl),
            offset,
            write_lock: Mutex::new(()),
        }
    }

    /// Writes the header row of every sheet that has none yet
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;
        for (sheet, headers) in [
            (VARIETIES_SHEET, &VARIETY_HEADERS[..]),
            (SHOPS_SHEET, &SHOP_HEADERS[..]),
            (ORDERS_SHEET, &ORDER_HEADERS[..]),
        ] {
            let header_range = row_range(sheet, headers.len(), 1);
            let existing = self.api.get_values(&header_range).await?;
            if existing.first().map_or(true, |row| row.is_empty()) {
                let header = headers.iter().map(|h| h.to_string()).collect();
                self.api
                    .update_values(&format!("{}!A1", sheet), vec![header])
                    .await?;
                self.invalidate(sheet);
                info!(sheet, "wrote sheet headers");
            }
        }
        Ok(())
    }

    fn cache_key(sheet: &str) -> String {
        format!("{}_full", sheet)
    }

    fn invalidate(&self, sheet: &str) {
        self.cache.invalidate_prefix(&format!("{}_", sheet));
    }

    async fn read_sheet(&self, sheet: &str) -> Result<Rows, ServiceError> {
        let key = Self::cache_key(sheet);
        if let Some(rows) = self.cache.get(&key) {
            return Ok(rows);
        }
        let rows = self.api.get_values(sheet).await?;
        debug!(sheet, rows = rows.len(), "loaded sheet");
        self.cache.insert(key, rows.clone());
        Ok(rows)
    }

    /// Appends after the last non-empty row; the caller holds the write lock.
    async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<i32, ServiceError> {
        let current = self.api.get_values(sheet).await?;
        let row_num = (current.len().max(1) + 1) as i32;
        self.api
            .update_values(&format!("{}!A{}", sheet, row_num), vec![row])
            .await?;
        self.invalidate(sheet);
        Ok(row_num)
    }

    async fn write_row(&self, sheet: &str, row_num: i32, row: Vec<String>) -> Result<(), ServiceError> {
        self.api
            .update_values(&format!("{}!A{}", sheet, row_num), vec![row])
            .await?;
        self.invalidate(sheet);
        Ok(())
    }

    async fn clear_row(&self, sheet: &str, width: usize, row_num: i32) -> Result<(), ServiceError> {
        self.api
            .clear_values(&row_range(sheet, width, row_num))
            .await?;
        self.invalidate(sheet);
        Ok(())
    }

    async fn all_orders(&self) -> Result<Vec<Order>, ServiceError> {
        let rows = self.read_sheet(ORDERS_SHEET).await?;
        let orders = data_rows(&rows)
            .filter_map(|(n, row)| parse_order(n, row, &self.offset))
            .collect();
        Ok(orders)
    }

    fn order_row(&self, write: &OrderWrite, created_at: DateTime<Utc>) -> Vec<String> {
        vec![
            write.variety_id.to_string(),
            write.shop_id.to_string(),
            write.quantity.to_string(),
            decimal_cell(write.price),
            write.delivery_date.format(DATE_FORMAT).to_string(),
            write.payment_status.as_str().to_string(),
            decimal_cell(write.paid_amount),
            created_at
                .with_timezone(&self.offset)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
        ]
    }

    /// Blanks every order row whose reference matches
    async fn clear_orders_where(
        &self,
        predicate: impl Fn(&Order) -> bool,
    ) -> Result<usize, ServiceError> {
        let doomed: Vec<i32> = self
            .all_orders()
            .await?
            .into_iter()
            .filter(|o| predicate(o))
            .map(|o| o.id)
            .collect();
        for row_num in &doomed {
            self.clear_row(ORDERS_SHEET, ORDER_HEADERS.len(), *row_num)
                .await?;
        }
        Ok(doomed.len())
    }
}

#[async_trait]
impl BakeryRepository for SheetsRepository {
    fn backend_name(&self) -> &'static str {
        "sheets"
    }

    async fn list_varieties(&self) -> Result<Vec<Variety>, ServiceError> {
        let rows = self.read_sheet(VARIETIES_SHEET).await?;
        let mut varieties: Vec<Variety> = data_rows(&rows)
            .filter_map(|(n, row)| parse_variety(n, row))
            .collect();
        varieties.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(varieties)
    }

    async fn get_variety(&self, id: i32) -> Result<Option<Variety>, ServiceError> {
        let rows = self.read_sheet(VARIETIES_SHEET).await?;
        let variety = data_rows(&rows)
            .find(|(n, _)| *n == id)
            .and_then(|(n, row)| parse_variety(n, row));
        Ok(variety)
    }

    async fn create_variety(
        &self,
        name: &str,
        default_price: Decimal,
    ) -> Result<Variety, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let id = self
            .append_row(
                VARIETIES_SHEET,
                vec![name.to_string(), decimal_cell(default_price)],
            )
            .await?;
        Ok(Variety {
            id,
            name: name.to_string(),
            default_price,
            created_at: None,
        })
    }

    async fn update_variety(
        &self,
        id: i32,
        name: &str,
        default_price: Decimal,
    ) -> Result<Variety, ServiceError> {
        let _guard = self.write_lock.lock().await;
        if self.get_variety(id).await?.is_none() {
            return Err(not_found("Variety", id));
        }
        self.write_row(
            VARIETIES_SHEET,
            id,
            vec![name.to_string(), decimal_cell(default_price)],
        )
        .await?;
        Ok(Variety {
            id,
            name: name.to_string(),
            default_price,
            created_at: None,
        })
    }

    #[instrument(skip(self))]
    async fn delete_variety(&self, id: i32) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;
        if self.get_variety(id).await?.is_none() {
            return Err(not_found("Variety", id));
        }
        let orders = self.clear_orders_where(|o| o.variety_id == id).await?;
        self.clear_row(VARIETIES_SHEET, VARIETY_HEADERS.len(), id)
            .await?;
        debug!(orders, "variety row cleared");
        Ok(())
    }

    async fn list_shops(&self) -> Result<Vec<Shop>, ServiceError> {
        let rows = self.read_sheet(SHOPS_SHEET).await?;
        let mut shops: Vec<Shop> = data_rows(&rows)
            .filter_map(|(n, row)| parse_shop(n, row))
            .collect();
        shops.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(shops)
    }

    async fn get_shop(&self, id: i32) -> Result<Option<Shop>, ServiceError> {
        let rows = self.read_sheet(SHOPS_SHEET).await?;
        let shop = data_rows(&rows)
            .find(|(n, _)| *n == id)
            .and_then(|(n, row)| parse_shop(n, row));
        Ok(shop)
    }

    async fn create_shop(&self, name: &str) -> Result<Shop, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let id = self
            .append_row(SHOPS_SHEET, vec![name.to_string()])
            .await?;
        Ok(Shop {
            id,
            name: name.to_string(),
            created_at: None,
        })
    }

    async fn update_shop(&self, id: i32, name: &str) -> Result<Shop, ServiceError> {
        let _guard = self.write_lock.lock().await;
        if self.get_shop(id).await?.is_none() {
            return Err(not_found("Shop", id));
        }
        self.write_row(SHOPS_SHEET, id, vec![name.to_string()])
            .await?;
        Ok(Shop {
            id,
            name: name.to_string(),
            created_at: None,
        })
    }

    #[instrument(skip(self))]
    async fn delete_shop(&self, id: i32) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;
        if self.get_shop(id).await?.is_none() {
            return Err(not_found("Shop", id));
        }
        let orders = self.clear_orders_where(|o| o.shop_id == id).await?;
        self.clear_row(SHOPS_SHEET, SHOP_HEADERS.len(), id).await?;
        debug!(orders, "shop row cleared");
        Ok(())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError> {
        let mut orders: Vec<Order> = self
            .all_orders()
            .await?
            .into_iter()
            .filter(|o| filter.matches(o))
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn get_order(&self, id: i32) -> Result<Option<Order>, ServiceError> {
        Ok(self.all_orders().await?.into_iter().find(|o| o.id == id))
    }

    async fn create_order(&self, write: &OrderWrite) -> Result<Order, ServiceError> {
        let _guard = self.write_lock.lock().await;
        // The sheet keeps whole seconds only
        let created_at = Utc::now().trunc_subsecs(0);
        let id = self
            .append_row(ORDERS_SHEET, self.order_row(write, created_at))
            .await?;
        Ok(Order {
            id,
            variety_id: write.variety_id,
            shop_id: write.shop_id,
            quantity: write.quantity,
            price: write.price,
            delivery_date: write.delivery_date,
            payment_status: write.payment_status,
            paid_amount: write.paid_amount,
            created_at,
        })
    }

    async fn update_order(&self, id: i32, write: &OrderWrite) -> Result<Order, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let existing = self
            .get_order(id)
            .await?
            .ok_or_else(|| not_found("Order", id))?;
        self.write_row(ORDERS_SHEET, id, self.order_row(write, existing.created_at))
            .await?;
        Ok(Order {
            id,
            variety_id: write.variety_id,
            shop_id: write.shop_id,
            quantity: write.quantity,
            price: write.price,
            delivery_date: write.delivery_date,
            payment_status: write.payment_status,
            paid_amount: write.paid_amount,
            created_at: existing.created_at,
        })
    }

    #[instrument(skip(self))]
    async fn delete_all_orders(&self) -> Result<u64, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let count = self.all_orders().await?.len() as u64;
        let range = format!(
            "{}!A2:{}",
            ORDERS_SHEET,
            last_column(ORDER_HEADERS.len())
        );
        self.api.clear_values(&range).await?;
        self.invalidate(ORDERS_SHEET);
        Ok(count)
    }

    async fn refresh_cache(&self, sheet: Option<&str>) -> Result<bool, ServiceError> {
        match sheet {
            Some(sheet) => self.invalidate(sheet),
            None => self.cache.clear(),
        }
        info!(
            "Cache refreshed{}",
            sheet.map(|s| format!(" for {}", s)).unwrap_or_else(|| " (all sheets)".into())
        );
        Ok(true)
    }
}
