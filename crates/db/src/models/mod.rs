//! Closed entity schemas, one per collection.
//!
//! Records live in the document as raw JSON; these types are what a record must decode
//! into before a write is accepted.

pub mod billing;
pub mod expense;
pub mod party;
pub mod product;
pub mod project;
pub mod task;
pub mod timesheet;
pub mod user;
pub mod workflow;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::document::{Collection, Record};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("{collection} record does not match its schema: {message}")]
    Schema {
        collection: Collection,
        message: String,
    },
    #[error("{collection}.{field} {message}")]
    Field {
        collection: Collection,
        field: &'static str,
        message: String,
    },
    #[error("{0} record is missing an id")]
    MissingId(Collection),
    #[error("duplicate id {id} in {collection}")]
    DuplicateId { collection: Collection, id: String },
    #[error("the id of {collection} record {id} cannot be changed")]
    IdChange { collection: Collection, id: String },
    #[error("{0}")]
    Rule(String),
}

/// A typed view of one collection's records
pub trait Entity: DeserializeOwned {
    const COLLECTION: Collection;

    /// Required-field rules beyond what the type itself enforces.
    fn check(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Decode `record` into the entity of `collection` and run its rules.
pub fn validate_record(collection: Collection, record: &Record) -> Result<(), ValidationError> {
    if record.id().is_none() {
        return Err(ValidationError::MissingId(collection));
    }
    match collection {
        Collection::Users => check::<user::User>(record),
        Collection::Projects => check::<project::Project>(record),
        Collection::Tasks => check::<task::Task>(record),
        Collection::TaskComments => check::<task::TaskComment>(record),
        Collection::Timesheets => check::<timesheet::Timesheet>(record),
        Collection::Expenses => check::<expense::Expense>(record),
        Collection::Invoices => check::<billing::Invoice>(record),
        Collection::SalesOrders => check::<billing::SalesOrder>(record),
        Collection::PurchaseOrders => check::<billing::PurchaseOrder>(record),
        Collection::VendorBills => check::<billing::VendorBill>(record),
        Collection::Customers => check::<party::Customer>(record),
        Collection::Vendors => check::<party::Vendor>(record),
        Collection::Products => check::<product::Product>(record),
        Collection::Workflows => check::<workflow::Workflow>(record),
    }
}

fn check<T: Entity>(record: &Record) -> Result<(), ValidationError> {
    let entity: T = record.decode().map_err(|e| ValidationError::Schema {
        collection: T::COLLECTION,
        message: e.to_string(),
    })?;
    entity.check()
}

pub(crate) fn require_text(
    collection: Collection,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Field {
            collection,
            field,
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn require_positive(
    collection: Collection,
    field: &'static str,
    value: f64,
) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::Field {
            collection,
            field,
            message: format!("must be a positive amount, got {value}"),
        });
    }
    Ok(())
}

pub(crate) fn require_non_negative(
    collection: Collection,
    field: &'static str,
    value: f64,
) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::Field {
            collection,
            field,
            message: format!("must not be negative, got {value}"),
        });
    }
    Ok(())
}
