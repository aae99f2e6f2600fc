use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use services::services::repository::StoreState;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// `loading` / `error` / `db` as one response
#[derive(Debug, Serialize, TS)]
pub struct DbState {
    pub loading: bool,
    pub error: Option<String>,
    pub revision: Option<u64>,
    #[ts(type = "Record<string, unknown> | null")]
    pub db: Option<Value>,
}

impl From<&StoreState> for DbState {
    fn from(state: &StoreState) -> Self {
        Self {
            loading: state.loading,
            error: state.error.as_ref().map(|e| e.to_string()),
            revision: state.db.as_ref().map(|db| db.revision()),
            db: state.db.as_ref().map(|db| db.to_value()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RevisionQuery {
    /// Revision the caller read before computing its replacement
    pub revision: Option<u64>,
}

/// GET /api/db
pub async fn get_db(State(state): State<AppState>) -> ResponseJson<ApiResponse<DbState>> {
    ResponseJson(ApiResponse::success(DbState::from(&state.access.state())))
}

/// PUT /api/db?revision=
/// Replace the named collections wholesale; with `revision`, only if nothing was written since
pub async fn update_db(
    State(state): State<AppState>,
    Query(query): Query<RevisionQuery>,
    Json(patch): Json<BTreeMap<String, Vec<Record>>>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    match query.revision {
        Some(revision) => state.access.update_db_at(revision, patch).await?,
        None => state.access.update_db(patch).await?,
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/db/reload
/// Load the document from the store again, e.g. after a failed first load
pub async fn reload(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<DbState>>, ApiError> {
    state.access.reload().await?;
    Ok(ResponseJson(ApiResponse::success(DbState::from(
        &state.access.state(),
    ))))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/db", get(get_db).put(update_db))
        .route("/db/reload", post(reload))
}
