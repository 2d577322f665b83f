//! HTTP error responses
//!
//! Every failure leaves the service as `{"error": {message, type, code}}`.
//! The `type` follows from the status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::{AuthorizationError, DomainError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    AuthenticationError,
    PermissionError,
    NotFoundError,
    RateLimitError,
    ServerError,
}

impl ApiErrorType {
    pub fn for_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::AuthenticationError,
            StatusCode::FORBIDDEN => Self::PermissionError,
            StatusCode::NOT_FOUND => Self::NotFoundError,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimitError,
            s if s.is_client_error() => Self::InvalidRequestError,
            _ => Self::ServerError,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let detail = ApiErrorDetail {
            message: message.into(),
            error_type: ApiErrorType::for_status(status),
            code: None,
        };

        Self {
            status,
            response: ApiErrorResponse { error: detail },
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.response.error.code = Some(code.into());
        self
    }

    fn server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            .with_code("INTERNAL_SERVER_ERROR")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { message } => Self::new(StatusCode::NOT_FOUND, message),
            DomainError::Validation { message } => Self::new(StatusCode::BAD_REQUEST, message),
            DomainError::InvalidPermission { message } => {
                Self::new(StatusCode::BAD_REQUEST, message).with_code("INVALID_PERMISSION")
            }
            other => {
                error!(error = %other, "Request failed on internal error");
                Self::server_error()
            }
        }
    }
}

/// Only the public message and code reach the client
impl From<AuthorizationError> for ApiError {
    fn from(err: AuthorizationError) -> Self {
        let status = match &err {
            AuthorizationError::MalformedKey
            | AuthorizationError::NotFound
            | AuthorizationError::WorkspaceMismatch
            | AuthorizationError::Disabled
            | AuthorizationError::Expired => StatusCode::UNAUTHORIZED,
            AuthorizationError::UsageExceeded | AuthorizationError::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AuthorizationError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            AuthorizationError::Internal(inner) => {
                error!(error = %inner, "Authorization failed on backing store");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        Self::new(status, err.public_message()).with_code(err.code())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.response.error.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_follows_status() {
        let err = ApiError::new(StatusCode::BAD_REQUEST, "Invalid permission");
        assert_eq!(err.response.error.error_type, ApiErrorType::InvalidRequestError);
        assert!(err.response.error.code.is_none());

        assert_eq!(
            ApiErrorType::for_status(StatusCode::UNPROCESSABLE_ENTITY),
            ApiErrorType::InvalidRequestError
        );
        assert_eq!(
            ApiErrorType::for_status(StatusCode::SERVICE_UNAVAILABLE),
            ApiErrorType::ServerError
        );
    }

    #[test]
    fn test_domain_errors_hide_internals() {
        let err: ApiError = DomainError::not_found("Key not found").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.response.error.message, "Key not found");

        let err: ApiError = DomainError::invalid_permission("bad").into();
        assert_eq!(err.response.error.code.as_deref(), Some("INVALID_PERMISSION"));

        let err: ApiError = DomainError::storage("pool exhausted").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.response.error.message.contains("pool"));
    }

    #[test]
    fn test_not_found_and_workspace_mismatch_are_identical() {
        let a: ApiError = AuthorizationError::NotFound.into();
        let b: ApiError = AuthorizationError::WorkspaceMismatch.into();

        assert_eq!(a.status, b.status);
        assert_eq!(
            serde_json::to_string(&a.response).unwrap(),
            serde_json::to_string(&b.response).unwrap()
        );
    }

    #[test]
    fn test_permission_denied_hides_detail() {
        let err: ApiError = AuthorizationError::PermissionDenied {
            message: "Missing permission: 'api.1.delete_api'".to_string(),
        }
        .into();

        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.response.error.error_type, ApiErrorType::PermissionError);
        assert_eq!(err.response.error.message, "insufficient permissions");
        assert_eq!(
            err.response.error.code.as_deref(),
            Some("INSUFFICIENT_PERMISSIONS")
        );
    }

    #[test]
    fn test_authorization_status_codes() {
        let status = |err: AuthorizationError| ApiError::from(err).status;

        assert_eq!(status(AuthorizationError::MalformedKey), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthorizationError::Disabled), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthorizationError::Expired), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(AuthorizationError::UsageExceeded),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status(AuthorizationError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status(AuthorizationError::Internal(DomainError::storage("x"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_body_shape() {
        let err: ApiError = AuthorizationError::NotFound.into();
        let body = serde_json::to_value(&err.response).unwrap();

        assert_eq!(body["error"]["type"], "authentication_error");
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "The key was not found");
    }
}
