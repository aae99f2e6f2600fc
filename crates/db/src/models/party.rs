use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{Entity, ValidationError, require_text};
use crate::document::Collection;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for Customer {
    const COLLECTION: Collection = Collection::Customers;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "name", &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Vendor {
    pub id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for Vendor {
    const COLLECTION: Collection = Collection::Vendors;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "name", &self.name)
    }
}
