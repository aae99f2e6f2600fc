use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use serde::Deserialize;
use services::services::views::{JoinedTask, ProjectData, ScopeRule};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ProjectDataQuery {
    pub scope: Option<ScopeRule>,
}

/// GET /api/users/{user_id}/project-data?scope=project_membership|owner
/// Projects the user belongs to with their tasks; timesheets and expenses follow `scope`
pub async fn get_project_data(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ProjectDataQuery>,
) -> Result<ResponseJson<ApiResponse<ProjectData>>, ApiError> {
    let data = state
        .access
        .project_data(&user_id, query.scope.unwrap_or_default())?;
    Ok(ResponseJson(ApiResponse::success(data)))
}

/// GET /api/users/{user_id}/tasks
/// Tasks of the user's projects with project and assignee names filled in
pub async fn get_joined_tasks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Vec<JoinedTask>>>, ApiError> {
    let tasks = state.access.get_joined_tasks(&user_id)?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/users/{user_id}",
        Router::new()
            .route("/project-data", get(get_project_data))
            .route("/tasks", get(get_joined_tasks)),
    )
}
