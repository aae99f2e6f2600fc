use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{Entity, ValidationError, require_non_negative, require_text};
use crate::document::Collection;

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub price: f64,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for Product {
    const COLLECTION: Collection = Collection::Products;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "name", &self.name)?;
        require_non_negative(Self::COLLECTION, "price", self.price)
    }
}
