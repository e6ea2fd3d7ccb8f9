use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::shop;

/// A shop or individual customer that receives deliveries
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Shop {
    pub id: i32,
    #[schema(example = "Corner Cafe")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<shop::Model> for Shop {
    fn from(model: shop::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            created_at: Some(model.created_at),
        }
    }
}
