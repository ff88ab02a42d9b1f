use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use thiserror::Error;

/// Authorization denial produced by the route policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    #[error("authentication required for {path}")]
    Unauthenticated { path: String },
    #[error("role '{required_role}' required for {path}")]
    Forbidden { path: String, required_role: String },
}

impl SecurityError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, SecurityError::Unauthenticated { .. })
    }

    pub fn path(&self) -> &str {
        match self {
            SecurityError::Unauthenticated { path } | SecurityError::Forbidden { path, .. } => path,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SecurityError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            SecurityError::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl From<SecurityError> for ApiError {
    fn from(e: SecurityError) -> Self {
        match e {
            SecurityError::Unauthenticated { path } => ApiError::Unauthorized {
                path: Some(path),
                message: None,
            },
            SecurityError::Forbidden {
                path,
                required_role,
            } => ApiError::ForbiddenMissingRole {
                role: required_role,
                path: Some(path),
            },
        }
    }
}

impl IntoResponse for SecurityError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
