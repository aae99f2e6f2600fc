use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use serde::Serialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::AppState;

#[derive(Debug, Serialize, TS)]
pub struct HealthStatus {
    pub loading: bool,
    pub revision: Option<u64>,
    pub error: Option<String>,
}

/// GET /api/health
/// Liveness, plus whether the document has been loaded yet
pub async fn health(State(state): State<AppState>) -> ResponseJson<ApiResponse<HealthStatus>> {
    let store = state.access.state();
    ResponseJson(ApiResponse::success(HealthStatus {
        loading: store.loading,
        revision: store.db.as_ref().map(|db| db.revision()),
        error: store.error.map(|e| e.to_string()),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
