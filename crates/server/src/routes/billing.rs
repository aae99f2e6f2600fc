use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::post,
};
use db::Record;
use serde::Deserialize;
use services::services::billing;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ApproveExpenseRequest {
    pub approver_id: String,
}

/// POST /api/sales-orders/{id}/invoice
/// Create a draft invoice from the order and mark the order invoiced
pub async fn invoice_sales_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<InvoiceRequest>,
) -> Result<ResponseJson<ApiResponse<Record>>, ApiError> {
    let invoice = billing::invoice_sales_order(&state.access, &id, payload.due_date).await?;
    Ok(ResponseJson(ApiResponse::success(invoice)))
}

/// POST /api/expenses/{id}/approve
pub async fn approve_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ApproveExpenseRequest>,
) -> Result<ResponseJson<ApiResponse<Record>>, ApiError> {
    if payload.approver_id.trim().is_empty() {
        return Err(ApiError::BadRequest("approverId is required".to_string()));
    }
    let expense = billing::approve_expense(&state.access, &id, &payload.approver_id).await?;
    Ok(ResponseJson(ApiResponse::success(expense)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales-orders/{id}/invoice", post(invoice_sales_order))
        .route("/expenses/{id}/approve", post(approve_expense))
}
