use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::models::{check_amount, Variety};
use crate::repositories::{not_found, BakeryRepository};

/// Body for adding or editing a variety
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VarietyRequest {
    #[serde(default)]
    #[schema(example = "Classic Brownie")]
    pub name: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "25.00")]
    pub default_price: Option<Decimal>,
}

impl VarietyRequest {
    fn validated(&self) -> Result<(String, Decimal), ServiceError> {
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        let (false, Some(price)) = (name.is_empty(), self.default_price) else {
            return Err(ServiceError::ValidationError(
                "Name and default price are required".to_string(),
            ));
        };
        if price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Default price must be a positive number".to_string(),
            ));
        }
        Ok((name.to_string(), check_amount(price)?))
    }
}

#[derive(Clone)]
pub struct VarietyService {
    repo: Arc<dyn BakeryRepository>,
}

impl VarietyService {
    pub fn new(repo: Arc<dyn BakeryRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<Variety>, ServiceError> {
        self.repo.list_varieties().await
    }

    pub async fn get(&self, id: i32) -> Result<Variety, ServiceError> {
        self.repo
            .get_variety(id)
            .await?
            .ok_or_else(|| not_found("Variety", id))
    }

    async fn ensure_unique(&self, name: &str, except: Option<i32>) -> Result<(), ServiceError> {
        match self.repo.find_variety_by_name(name).await? {
            Some(existing) if Some(existing.id) != except => Err(ServiceError::Conflict(
                "A variety with this name already exists".to_string(),
            )),
            _ => Ok(()),
        }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, request: VarietyRequest) -> Result<Variety, ServiceError> {
        let (name, price) = request.validated()?;
        self.ensure_unique(&name, None).await?;
        let variety = self.repo.create_variety(&name, price).await?;
        info!(variety_id = variety.id, "variety added");
        Ok(variety)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: i32, request: VarietyRequest) -> Result<Variety, ServiceError> {
        self.get(id).await?;
        let (name, price) = request.validated()?;
        self.ensure_unique(&name, Some(id)).await?;
        self.repo.update_variety(id, &name, price).await
    }

    /// Deletes the variety and its orders, returning what was removed
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<Variety, ServiceError> {
        let variety = self.get(id).await?;
        self.repo.delete_variety(id).await?;
        info!(variety_id = id, "variety deleted");
        Ok(variety)
    }
}
