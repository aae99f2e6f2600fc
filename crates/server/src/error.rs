use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use db::ValidationError;
use services::services::repository::DataError;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Data(err.into())
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Data(DataError::RecordNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Data(DataError::Validation(_)) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Data(DataError::StaleSnapshot { .. }) => StatusCode::CONFLICT,
            Self::Data(
                DataError::NotLoaded | DataError::StoreUnavailable(_) | DataError::Timeout { .. },
            ) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Data(DataError::WriterStopped) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }
        let body = ApiResponse::<()>::error(&self.to_string());
        (status, ResponseJson(body)).into_response()
    }
}
