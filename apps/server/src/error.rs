use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fieldops_core::errors::{DatabaseError, Error as CoreError};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        if err.is_not_found() {
            return ApiError::NotFound(err.to_string());
        }
        match err {
            CoreError::Validation(_) | CoreError::Json(_) | CoreError::Timestamp(_) => {
                ApiError::BadRequest(err.to_string())
            }
            CoreError::Database(DatabaseError::UniqueViolation(_)) => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_status_codes() {
        assert_eq!(
            ApiError::from(CoreError::invalid_input("bad")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CoreError::not_found("Outgrower", "OG-1")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CoreError::internal("disk full")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
