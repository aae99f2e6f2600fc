use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{patch, post},
};
use db::Record;
use serde_json::{Map, Value};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// POST /api/collections/{collection}
/// Append a record; the id and createdAt are assigned here
pub async fn add_record(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<ResponseJson<ApiResponse<Record>>, ApiError> {
    let record = state.access.add_record(&collection, fields).await?;
    Ok(ResponseJson(ApiResponse::success(record)))
}

/// PATCH /api/collections/{collection}/{id}
pub async fn update_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<ResponseJson<ApiResponse<Record>>, ApiError> {
    let record = state.access.update_record(&collection, &id, patch).await?;
    Ok(ResponseJson(ApiResponse::success(record)))
}

/// DELETE /api/collections/{collection}/{id}
/// Succeeds whether or not the record existed
pub async fn delete_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.access.delete_record(&collection, &id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/collections/{collection}",
        Router::new()
            .route("/", post(add_record))
            .route("/{id}", patch(update_record).delete(delete_record)),
    )
}
