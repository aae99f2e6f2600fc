//! The root JSON document and the collections it holds.
//!
//! Records are kept as raw JSON objects so a load followed by a save never drops or
//! coerces a field. Entity schemas in [`crate::models`] are applied on writes only.

use std::{collections::BTreeMap, str::FromStr};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned, ser::SerializeMap,
};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::ValidationError;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;
pub const SCHEMA_VERSION_KEY: &str = "schemaVersion";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document root must be a JSON object")]
    NotAnObject,
    #[error("collection {0} must be an array")]
    CollectionNotArray(Collection),
    #[error("entry {index} in {collection} is not an object")]
    RecordNotObject { collection: Collection, index: usize },
    #[error("invalid schemaVersion: {0}")]
    InvalidVersion(Value),
    #[error("schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("json error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Named collections of the application document
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Collection {
    Users,
    Projects,
    Tasks,
    TaskComments,
    Timesheets,
    Expenses,
    Invoices,
    SalesOrders,
    PurchaseOrders,
    VendorBills,
    Customers,
    Vendors,
    Products,
    Workflows,
}

impl Collection {
    /// Parse a collection name as used in the document (`"salesOrders"`).
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        Self::from_str(name).map_err(|_| ValidationError::UnknownCollection(name.to_string()))
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Users => "user",
            Self::Projects => "proj",
            Self::Tasks => "task",
            Self::TaskComments => "comment",
            Self::Timesheets => "ts",
            Self::Expenses => "exp",
            Self::Invoices => "inv",
            Self::SalesOrders => "so",
            Self::PurchaseOrders => "po",
            Self::VendorBills => "bill",
            Self::Customers => "cust",
            Self::Vendors => "vendor",
            Self::Products => "prod",
            Self::Workflows => "wf",
        }
    }

    /// Field shown when another record refers to one of ours
    pub fn display_field(self) -> &'static str {
        match self {
            Self::Tasks => "title",
            Self::TaskComments => "body",
            Self::Invoices | Self::SalesOrders | Self::PurchaseOrders | Self::VendorBills => {
                "number"
            }
            Self::Timesheets | Self::Expenses => "description",
            _ => "name",
        }
    }

    /// Fresh collision-resistant id, `<prefix>-<uuid>`
    pub fn new_id(self) -> String {
        format!("{}-{}", self.id_prefix(), Uuid::new_v4())
    }
}

/// One entity instance: a JSON object with a string `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub const ID: &'static str = "id";

    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field(Self::ID)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// String value of `field`; `None` when absent, null, empty or not a string.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// String entries of an array field; anything else yields nothing.
    pub fn str_list<'a>(&'a self, field: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .get(field)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Shallow merge: every top-level key of `patch` replaces ours.
    pub fn merge(&mut self, patch: &Map<String, Value>) {
        for (key, value) in patch {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(Value::Object(self.0.clone()))
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// The single root object holding every collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    schema_version: u32,
    collections: BTreeMap<Collection, Vec<Record>>,
    /// Top-level keys that are not collections we know about, kept verbatim.
    extra: Map<String, Value>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            collections: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        let Value::Object(root) = value else {
            return Err(DocumentError::NotAnObject);
        };

        let mut version = None;
        let mut collections = BTreeMap::new();
        let mut extra = Map::new();

        for (key, value) in root {
            if key == SCHEMA_VERSION_KEY {
                let parsed = value
                    .as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| DocumentError::InvalidVersion(value.clone()))?;
                version = Some(parsed);
                continue;
            }

            let Ok(collection) = Collection::from_str(&key) else {
                extra.insert(key, value);
                continue;
            };
            let Value::Array(items) = value else {
                return Err(DocumentError::CollectionNotArray(collection));
            };
            let records = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    Record::from_value(item)
                        .ok_or(DocumentError::RecordNotObject { collection, index })
                })
                .collect::<Result<Vec<_>, _>>()?;
            collections.insert(collection, records);
        }

        let schema_version = match version {
            Some(found) if found > CURRENT_SCHEMA_VERSION => {
                return Err(DocumentError::UnsupportedVersion {
                    found,
                    supported: CURRENT_SCHEMA_VERSION,
                });
            }
            Some(found) if found > 0 => found,
            _ => {
                debug!(
                    version = CURRENT_SCHEMA_VERSION,
                    "Stamping legacy document with schema version"
                );
                CURRENT_SCHEMA_VERSION
            }
        };

        Ok(Self {
            schema_version,
            collections,
            extra,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        root.insert(SCHEMA_VERSION_KEY.to_string(), Value::from(self.schema_version));
        for (collection, records) in &self.collections {
            root.insert(
                collection.to_string(),
                Value::Array(records.iter().cloned().map(Record::into_value).collect()),
            );
        }
        for (key, value) in &self.extra {
            root.insert(key.clone(), value.clone());
        }
        Value::Object(root)
    }

    pub fn to_json_string(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_vec_pretty(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Records of `collection`; an absent collection reads as empty.
    pub fn collection(&self, collection: Collection) -> &[Record] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_collection(&self, collection: Collection) -> bool {
        self.collections.contains_key(&collection)
    }

    pub fn collection_mut(&mut self, collection: Collection) -> &mut Vec<Record> {
        self.collections.entry(collection).or_default()
    }

    pub fn replace_collection(&mut self, collection: Collection, records: Vec<Record>) {
        self.collections.insert(collection, records);
    }

    pub fn collections(&self) -> impl Iterator<Item = (Collection, &[Record])> {
        self.collections
            .iter()
            .map(|(collection, records)| (*collection, records.as_slice()))
    }

    pub fn position(&self, collection: Collection, id: &str) -> Option<usize> {
        self.collection(collection)
            .iter()
            .position(|record| record.id() == Some(id))
    }

    pub fn find(&self, collection: Collection, id: &str) -> Option<&Record> {
        self.collection(collection)
            .iter()
            .find(|record| record.id() == Some(id))
    }

    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map =
            serializer.serialize_map(Some(1 + self.collections.len() + self.extra.len()))?;
        map.serialize_entry(SCHEMA_VERSION_KEY, &self.schema_version)?;
        for (collection, records) in &self.collections {
            map.serialize_entry(collection.as_str(), records)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}
