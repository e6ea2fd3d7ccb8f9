use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{accumulate, money};
use crate::errors::ServiceError;
use crate::models::{OrderFilter, Shop};
use crate::repositories::{not_found, BakeryRepository};

const DUPLICATE_SHOP: &str = "A shop/customer with this name already exists";

/// Body for adding or renaming a shop/customer
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ShopRequest {
    #[serde(default)]
    #[schema(example = "Corner Cafe")]
    pub name: Option<String>,
}

impl ShopRequest {
    fn validated(&self) -> Result<String, ServiceError> {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(ServiceError::ValidationError("Name is required".to_string())),
        }
    }
}

/// A shop with what it still owes
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShopBalance {
    #[serde(flatten)]
    pub shop: Shop,
    #[schema(value_type = String, example = "125.00")]
    pub pending: Decimal,
    /// Orders with a pending amount
    pub unpaid_count: usize,
}

#[derive(Clone)]
pub struct ShopService {
    repo: Arc<dyn BakeryRepository>,
}

impl ShopService {
    pub fn new(repo: Arc<dyn BakeryRepository>) -> Self {
        Self { repo }
    }

    pub async fn get(&self, id: i32) -> Result<Shop, ServiceError> {
        self.repo
            .get_shop(id)
            .await?
            .ok_or_else(|| not_found("Shop", id))
    }

    /// Every shop ordered by name, with pending totals over all its orders
    #[instrument(skip(self))]
    pub async fn list_with_pending(&self) -> Result<Vec<ShopBalance>, ServiceError> {
        let shops = self.repo.list_shops().await?;
        let orders = self.repo.list_orders(&OrderFilter::all()).await?;

        let mut balances: HashMap<i32, (Decimal, usize)> = HashMap::new();
        for order in orders.iter().filter(|o| o.is_outstanding()) {
            let entry = balances.entry(order.shop_id).or_default();
            accumulate(&mut entry.0, order.pending())?;
            entry.1 += 1;
        }

        Ok(shops
            .into_iter()
            .map(|shop| {
                let (pending, unpaid_count) = balances.get(&shop.id).copied().unwrap_or_default();
                ShopBalance {
                    shop,
                    pending: money(pending),
                    unpaid_count,
                }
            })
            .collect())
    }

    async fn ensure_unique(&self, name: &str, except: Option<i32>) -> Result<(), ServiceError> {
        match self.repo.find_shop_by_name(name).await? {
            Some(existing) if Some(existing.id) != except => {
                Err(ServiceError::Conflict(DUPLICATE_SHOP.to_string()))
            }
            _ => Ok(()),
        }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, request: ShopRequest) -> Result<Shop, ServiceError> {
        let name = request.validated()?;
        self.ensure_unique(&name, None).await?;
        let shop = self.repo.create_shop(&name).await?;
        info!(shop_id = shop.id, "shop added");
        Ok(shop)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: i32, request: ShopRequest) -> Result<Shop, ServiceError> {
        self.get(id).await?;
        let name = request.validated()?;
        self.ensure_unique(&name, Some(id)).await?;
        self.repo.update_shop(id, &name).await
    }

    /// Deletes the shop and its orders, returning what was removed
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<Shop, ServiceError> {
        let shop = self.get(id).await?;
        self.repo.delete_shop(id).await?;
        info!(shop_id = id, "shop deleted");
        Ok(shop)
    }
}
