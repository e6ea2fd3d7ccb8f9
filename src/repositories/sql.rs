use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{not_found, BakeryRepository};
use crate::entities::{order, shop, variety};
use crate::errors::ServiceError;
use crate::models::{Order, OrderFilter, OrderWrite, Shop, Variety};

/// Relational store over sea-orm (SQLite or Postgres)
#[derive(Debug, Clone)]
pub struct SqlRepository {
    db: Arc<DatabaseConnection>,
}

impl SqlRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Unique-name violations surface as conflicts, everything else as database errors.
fn write_error(err: DbErr, what: &str) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ServiceError::Conflict(format!("A {} with this name already exists", what))
        }
        _ => ServiceError::DatabaseError(err),
    }
}

#[async_trait]
impl BakeryRepository for SqlRepository {
    fn backend_name(&self) -> &'static str {
        "sql"
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        crate::db::check_connection(&self.db).await
    }

    async fn list_varieties(&self) -> Result<Vec<Variety>, ServiceError> {
        let rows = variety::Entity::find()
            .order_by_asc(variety::Column::Name)
            .all(self.connection())
            .await?;
        Ok(rows.into_iter().map(Variety::from).collect())
    }

    async fn get_variety(&self, id: i32) -> Result<Option<Variety>, ServiceError> {
        Ok(variety::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .map(Variety::from))
    }

    async fn find_variety_by_name(&self, name: &str) -> Result<Option<Variety>, ServiceError> {
        Ok(variety::Entity::find()
            .filter(variety::Column::Name.eq(name))
            .one(self.connection())
            .await?
            .map(Variety::from))
    }

    async fn create_variety(
        &self,
        name: &str,
        default_price: Decimal,
    ) -> Result<Variety, ServiceError> {
        let model = variety::ActiveModel {
            name: Set(name.to_string()),
            default_price: Set(default_price),
            ..Default::default()
        }
        .insert(self.connection())
        .await
        .map_err(|e| write_error(e, "variety"))?;
        Ok(model.into())
    }

    async fn update_variety(
        &self,
        id: i32,
        name: &str,
        default_price: Decimal,
    ) -> Result<Variety, ServiceError> {
        let existing = variety::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| not_found("Variety", id))?;

        let mut active = existing.into_active_model();
        active.name = Set(name.to_string());
        active.default_price = Set(default_price);
        let model = active
            .update(self.connection())
            .await
            .map_err(|e| write_error(e, "variety"))?;
        Ok(model.into())
    }

    #[instrument(skip(self))]
    async fn delete_variety(&self, id: i32) -> Result<(), ServiceError> {
        let txn = self.connection().begin().await?;

        // Child rows go first so databases without enforced foreign keys stay consistent
        let orders = order::Entity::delete_many()
            .filter(order::Column::VarietyId.eq(id))
            .exec(&txn)
            .await?;
        let deleted = variety::Entity::delete_by_id(id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            return Err(not_found("Variety", id));
        }

        txn.commit().await?;
        debug!(orders = orders.rows_affected, "variety deleted");
        Ok(())
    }

    async fn list_shops(&self) -> Result<Vec<Shop>, ServiceError> {
        let rows = shop::Entity::find()
            .order_by_asc(shop::Column::Name)
            .all(self.connection())
            .await?;
        Ok(rows.into_iter().map(Shop::from).collect())
    }

    async fn get_shop(&self, id: i32) -> Result<Option<Shop>, ServiceError> {
        Ok(shop::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .map(Shop::from))
    }

    async fn create_shop(&self, name: &str) -> Result<Shop, ServiceError> {
        let model = shop::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(self.connection())
        .await
        .map_err(|e| write_error(e, "shop/customer"))?;
        Ok(model.into())
    }

    async fn update_shop(&self, id: i32, name: &str) -> Result<Shop, ServiceError> {
        let existing = shop::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| not_found("Shop", id))?;

        let mut active = existing.into_active_model();
        active.name = Set(name.to_string());
        let model = active
            .update(self.connection())
            .await
            .map_err(|e| write_error(e, "shop/customer"))?;
        Ok(model.into())
    }

    #[instrument(skip(self))]
    async fn delete_shop(&self, id: i32) -> Result<(), ServiceError> {
        let txn = self.connection().begin().await?;

        let orders = order::Entity::delete_many()
            .filter(order::Column::ShopId.eq(id))
            .exec(&txn)
            .await?;
        let deleted = shop::Entity::delete_by_id(id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            return Err(not_found("Shop", id));
        }

        txn.commit().await?;
        debug!(orders = orders.rows_affected, "shop deleted");
        Ok(())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError> {
        let mut query = order::Entity::find();

        if let Some(shop_id) = filter.shop_id {
            query = query.filter(order::Column::ShopId.eq(shop_id));
        }
        if filter.year.is_some() {
            // An impossible month matches nothing
            let Some((start, end)) = filter.date_range() else {
                return Ok(Vec::new());
            };
            query = query
                .filter(order::Column::DeliveryDate.gte(start))
                .filter(order::Column::DeliveryDate.lt(end));
        }

        let rows = query
            .order_by_desc(order::Column::DeliveryDate)
            .order_by_desc(order::Column::CreatedAt)
            .all(self.connection())
            .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn get_order(&self, id: i32) -> Result<Option<Order>, ServiceError> {
        Ok(order::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .map(Order::from))
    }

    async fn create_order(&self, write: &OrderWrite) -> Result<Order, ServiceError> {
        let model = order::ActiveModel {
            variety_id: Set(write.variety_id),
            shop_id: Set(write.shop_id),
            quantity: Set(write.quantity),
            price: Set(write.price),
            delivery_date: Set(write.delivery_date),
            payment_status: Set(write.payment_status.as_str().to_string()),
            paid_amount: Set(write.paid_amount),
            ..Default::default()
        }
        .insert(self.connection())
        .await?;
        Ok(model.into())
    }

    async fn update_order(&self, id: i32, write: &OrderWrite) -> Result<Order, ServiceError> {
        let existing = order::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| not_found("Order", id))?;

        let mut active = existing.into_active_model();
        active.variety_id = Set(write.variety_id);
        active.shop_id = Set(write.shop_id);
        active.quantity = Set(write.quantity);
        active.price = Set(write.price);
        active.delivery_date = Set(write.delivery_date);
        active.payment_status = Set(write.payment_status.as_str().to_string());
        active.paid_amount = Set(write.paid_amount);
        let model = active.update(self.connection()).await?;
        Ok(model.into())
    }

    async fn delete_all_orders(&self) -> Result<u64, ServiceError> {
        let result = order::Entity::delete_many()
            .exec(self.connection())
            .await?;
        Ok(result.rows_affected)
    }

    async fn order_years(&self) -> Result<Vec<i32>, ServiceError> {
        let dates: Vec<NaiveDate> = order::Entity::find()
            .select_only()
            .column(order::Column::DeliveryDate)
            .distinct()
            .into_tuple()
            .all(self.connection())
            .await?;
        let years: BTreeSet<i32> = dates.iter().map(|d| d.year()).collect();
        Ok(years.into_iter().rev().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::models::PaymentStatus;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    async fn repo() -> SqlRepository {
        let pool = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&pool).await.unwrap();
        SqlRepository::new(Arc::new(pool))
    }

    fn write(variety_id: i32, shop_id: i32, date: (i32, u32, u32)) -> OrderWrite {
        OrderWrite {
            variety_id,
            shop_id,
            quantity: 2,
            price: dec!(25),
            delivery_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            payment_status: PaymentStatus::Unpaid,
            paid_amount: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn deleting_a_variety_removes_its_orders() {
        let repo = repo().await;
        let classic = repo.create_variety("Classic", dec!(25)).await.unwrap();
        let walnut = repo.create_variety("Walnut", dec!(30)).await.unwrap();
        let shop = repo.create_shop("Corner Cafe").await.unwrap();
        repo.create_order(&write(classic.id, shop.id, (2024, 3, 1)))
            .await
            .unwrap();
        repo.create_order(&write(walnut.id, shop.id, (2024, 3, 2)))
            .await
            .unwrap();

        repo.delete_variety(classic.id).await.unwrap();

        let remaining = repo.list_orders(&OrderFilter::all()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].variety_id, walnut.id);
        assert_matches!(
            repo.delete_variety(classic.id).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn shop_lookup_ignores_case() {
        let repo = repo().await;
        repo.create_shop("Corner Cafe").await.unwrap();
        let found = repo.find_shop_by_name("corner CAFE").await.unwrap();
        assert_eq!(found.map(|s| s.name).as_deref(), Some("Corner Cafe"));
        assert!(repo.find_variety_by_name("Classic").await.unwrap().is_none());

        repo.create_shop("Café Élan").await.unwrap();
        let found = repo.find_shop_by_name("CAFÉ ÉLAN").await.unwrap();
        assert_eq!(found.map(|s| s.name).as_deref(), Some("Café Élan"));
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let repo = repo().await;
        repo.create_variety("Classic", dec!(25)).await.unwrap();
        assert_matches!(
            repo.create_variety("Classic", dec!(20)).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn month_filter_and_ordering() {
        let repo = repo().await;
        let v = repo.create_variety("Classic", dec!(25)).await.unwrap();
        let s = repo.create_shop("Corner Cafe").await.unwrap();
        for date in [(2024, 2, 29), (2024, 3, 1), (2024, 3, 31), (2025, 3, 10)] {
            repo.create_order(&write(v.id, s.id, date)).await.unwrap();
        }

        let march = repo
            .list_orders(&OrderFilter::for_month(2024, 3))
            .await
            .unwrap();
        let dates: Vec<String> = march.iter().map(|o| o.delivery_date.to_string()).collect();
        assert_eq!(dates, vec!["2024-03-31", "2024-03-01"]);

        assert_eq!(repo.order_years().await.unwrap(), vec![2025, 2024]);
        assert!(repo
            .list_orders(&OrderFilter::for_month(2024, 13))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn update_keeps_created_at_and_delete_all_counts() {
        let repo = repo().await;
        let v = repo.create_variety("Classic", dec!(25)).await.unwrap();
        let s = repo.create_shop("Corner Cafe").await.unwrap();
        let created = repo.create_order(&write(v.id, s.id, (2024, 3, 1))).await.unwrap();

        let mut change = write(v.id, s.id, (2024, 3, 5));
        change.quantity = 4;
        let updated = repo.update_order(created.id, &change).await.unwrap();
        assert_eq!(updated.quantity, 4);
        assert_eq!(updated.created_at, created.created_at);

        repo.create_order(&write(v.id, s.id, (2024, 3, 2))).await.unwrap();
        assert_eq!(repo.delete_all_orders().await.unwrap(), 2);
        assert_eq!(repo.delete_all_orders().await.unwrap(), 0);
    }
}
