use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, RepositoryError};
use serde_json::json;

/// API 错误
///
/// 响应体统一为 `{"status": "error", "message": "..."}`。
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(DomainError::ValidationError { field, message }) => {
                ApiError::bad_request(format!("{}: {}", field, message))
            }
            ApplicationError::Domain(DomainError::PermissionDenied { .. }) => {
                ApiError::forbidden("Not authorized to modify this post")
            }
            ApplicationError::Domain(DomainError::ResourceNotFound { resource_type, .. }) => {
                ApiError::not_found(format!("{} not found", resource_type))
            }
            ApplicationError::Repository(RepositoryError::NotFound) => {
                ApiError::not_found("resource not found")
            }
            ApplicationError::Repository(RepositoryError::Conflict) => {
                ApiError::new(StatusCode::CONFLICT, "resource already exists")
            }
            other => {
                // 内部细节不外泄，记录后返回通用错误
                tracing::error!(error = %other, "request failed");
                ApiError::internal_server_error("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "status": "error",
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}
