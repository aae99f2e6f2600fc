//! Operations that must keep two records consistent.

use chrono::Utc;
use db::{
    Collection, Record, ValidationError,
    models::{
        billing::{INVOICE_DRAFT, SALES_ORDER_INVOICED, SalesOrder},
        expense::{Expense, ExpenseStatus},
    },
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::info;

use super::{
    hook::DataAccess,
    repository::{Command, DataError, Outcome},
    snapshot::Snapshot,
};

fn load<T: DeserializeOwned>(
    snapshot: &Snapshot,
    collection: Collection,
    id: &str,
) -> Result<T, DataError> {
    let record = snapshot
        .find(collection, id)
        .ok_or_else(|| DataError::RecordNotFound {
            collection,
            id: id.to_string(),
        })?;
    record.decode().map_err(|e| {
        ValidationError::Schema {
            collection,
            message: e.to_string(),
        }
        .into()
    })
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

const INVOICE_PREFIX: &str = "INV-";

/// One past the highest `INV-<n>` in use, so numbers are not reused after a deletion.
fn next_invoice_number(snapshot: &Snapshot) -> String {
    let highest = snapshot
        .collection(Collection::Invoices)
        .iter()
        .filter_map(|invoice| invoice.str_field("number")?.strip_prefix(INVOICE_PREFIX))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:04}", INVOICE_PREFIX, highest + 1)
}

/// Raise a draft invoice for a sales order and mark the order invoiced, both or neither.
///
/// Refused with `StaleSnapshot` if the document changed between reading the order and
/// writing, so an order can never be invoiced twice.
pub async fn invoice_sales_order(
    access: &DataAccess,
    sales_order_id: &str,
    due_date: Option<String>,
) -> Result<Record, DataError> {
    let snapshot = access.db().ok_or(DataError::NotLoaded)?;
    let order: SalesOrder = load(&snapshot, Collection::SalesOrders, sales_order_id)?;
    if order.is_invoiced() {
        return Err(ValidationError::Rule(format!(
            "sales order {sales_order_id} has already been invoiced"
        ))
        .into());
    }

    let invoice_id = Collection::Invoices.new_id();
    let number = next_invoice_number(&snapshot);
    let invoice = object(json!({
        "id": invoice_id,
        "number": number,
        "customerName": order.customer_name,
        "customerId": order.customer_id,
        "projectId": order.project_id,
        "salesOrderId": order.id,
        "amount": order.amount,
        "status": INVOICE_DRAFT,
        "issueDate": Utc::now().date_naive().to_string(),
        "dueDate": due_date,
    }));
    let mark_invoiced = object(json!({
        "status": SALES_ORDER_INVOICED,
        "invoiceId": invoice_id,
    }));

    let outcomes = access
        .transaction_at(
            snapshot.revision(),
            vec![
                Command::Insert {
                    collection: Collection::Invoices,
                    fields: invoice,
                },
                Command::Patch {
                    collection: Collection::SalesOrders,
                    id: sales_order_id.to_string(),
                    patch: mark_invoiced,
                },
            ],
        )
        .await?;

    info!(
        sales_order_id = %sales_order_id,
        invoice_id = %invoice_id,
        amount = order.amount,
        "Sales order invoiced"
    );
    match outcomes.into_iter().next() {
        Some(Outcome::Inserted(record)) => Ok(record),
        _ => Err(DataError::WriterStopped),
    }
}

pub async fn approve_expense(
    access: &DataAccess,
    expense_id: &str,
    approver_id: &str,
) -> Result<Record, DataError> {
    let snapshot = access.db().ok_or(DataError::NotLoaded)?;
    let expense: Expense = load(&snapshot, Collection::Expenses, expense_id)?;
    if !expense.status.can_approve() {
        return Err(ValidationError::Rule(format!(
            "expense {expense_id} is {} and cannot be approved",
            expense.status
        ))
        .into());
    }

    let outcomes = access
        .transaction_at(
            snapshot.revision(),
            vec![Command::Patch {
                collection: Collection::Expenses,
                id: expense_id.to_string(),
                patch: object(json!({
                    "status": ExpenseStatus::Approved,
                    "approvedBy": approver_id,
                })),
            }],
        )
        .await?;

    info!(expense_id = %expense_id, approver_id = %approver_id, "Expense approved");
    match outcomes.into_iter().next() {
        Some(Outcome::Patched(record)) => Ok(record),
        _ => Err(DataError::WriterStopped),
    }
}
