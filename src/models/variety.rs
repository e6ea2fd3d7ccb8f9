use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::variety;

/// A product line with its usual unit price
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Variety {
    pub id: i32,
    #[schema(example = "Walnut Brownie")]
    pub name: String,
    #[schema(value_type = String, example = "25.00")]
    pub default_price: Decimal,
    /// Unset for spreadsheet-backed rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<variety::Model> for Variety {
    fn from(model: variety::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            default_price: model.default_price,
            created_at: Some(model.created_at),
        }
    }
}
