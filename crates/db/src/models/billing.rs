//! Invoices, sales orders, purchase orders and vendor bills.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{Entity, ValidationError, require_non_negative, require_text};
use crate::document::Collection;

pub const SALES_ORDER_INVOICED: &str = "invoiced";
pub const INVOICE_DRAFT: &str = "draft";

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Invoice {
    pub id: String,
    pub number: Option<String>,
    pub customer_name: String,
    pub customer_id: Option<String>,
    pub project_id: Option<String>,
    pub sales_order_id: Option<String>, // Set when the invoice was raised from an order
    pub amount: f64,
    pub status: Option<String>,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub paid_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for Invoice {
    const COLLECTION: Collection = Collection::Invoices;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "customerName", &self.customer_name)?;
        require_non_negative(Self::COLLECTION, "amount", self.amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SalesOrder {
    pub id: String,
    pub number: Option<String>,
    pub customer_name: String,
    pub customer_id: Option<String>,
    pub project_id: Option<String>,
    pub invoice_id: Option<String>,
    pub amount: f64,
    pub status: Option<String>,
    pub order_date: Option<String>,
    pub delivery_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl SalesOrder {
    pub fn is_invoiced(&self) -> bool {
        self.invoice_id.is_some() || self.status.as_deref() == Some(SALES_ORDER_INVOICED)
    }
}

impl Entity for SalesOrder {
    const COLLECTION: Collection = Collection::SalesOrders;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "customerName", &self.customer_name)?;
        require_non_negative(Self::COLLECTION, "amount", self.amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PurchaseOrder {
    pub id: String,
    pub number: Option<String>,
    pub vendor: String,
    pub vendor_id: Option<String>,
    pub project_id: Option<String>,
    pub amount: f64,
    pub status: Option<String>,
    pub order_date: Option<String>,
    pub expected_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for PurchaseOrder {
    const COLLECTION: Collection = Collection::PurchaseOrders;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "vendor", &self.vendor)?;
        require_non_negative(Self::COLLECTION, "amount", self.amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VendorBill {
    pub id: String,
    pub number: Option<String>,
    pub vendor: String,
    pub vendor_id: Option<String>,
    pub project_id: Option<String>,
    pub purchase_order_id: Option<String>,
    pub amount: f64,
    pub status: Option<String>,
    pub bill_date: Option<String>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity for VendorBill {
    const COLLECTION: Collection = Collection::VendorBills;

    fn check(&self) -> Result<(), ValidationError> {
        require_text(Self::COLLECTION, "vendor", &self.vendor)?;
        require_non_negative(Self::COLLECTION, "amount", self.amount)
    }
}
