use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;

mod metrics;
#[doc(hidden)]
pub mod test_helpers;

pub use metrics::{http_error_metrics_layer, record_http_error, ERROR_CODE_HEADER, MAX_ERROR_CODES, OVERFLOW_CODE};

pub const UNAUTHORIZED_MESSAGE: &str = "Authentication is required to access this resource.";
pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to access this resource.";
pub const INTERNAL_MESSAGE: &str = "An internal error occurred.";

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")] pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub missing_role: Option<String>,
    pub message: String,
}

/// Client-facing error envelope shared by every endpoint. Messages must be
/// safe to show to callers.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized { path: Option<String>, message: Option<String> },
    ForbiddenMissingRole { role: String, path: Option<String> },
    BadRequest { code: &'static str, message: String, path: Option<String> },
    NotFound { code: &'static str, message: String, path: Option<String> },
    Conflict { code: &'static str, message: String, path: Option<String> },
    Unavailable { code: &'static str, message: String, path: Option<String> },
    Internal { message: Option<String>, path: Option<String> },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn unauthorized(path: impl Into<String>) -> Self { Self::Unauthorized { path: Some(path.into()), message: None } }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest { code, message: message.into(), path: None }
    }

    /// Attaches the request path unless one is already set.
    pub fn with_path(mut self, request_path: impl Into<String>) -> Self {
        let slot = match &mut self {
            ApiError::Unauthorized { path, .. }
            | ApiError::ForbiddenMissingRole { path, .. }
            | ApiError::BadRequest { path, .. }
            | ApiError::NotFound { path, .. }
            | ApiError::Conflict { path, .. }
            | ApiError::Unavailable { path, .. }
            | ApiError::Internal { path, .. } => path,
        };
        if slot.is_none() {
            *slot = Some(request_path.into());
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::ForbiddenMissingRole { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized { .. } => "unauthorized",
            ApiError::ForbiddenMissingRole { .. } => "missing_role",
            ApiError::BadRequest { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::Conflict { code, .. }
            | ApiError::Unavailable { code, .. } => code,
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let body = match self {
            ApiError::Unauthorized { path, message } => ErrorBody {
                code,
                path,
                missing_role: None,
                message: message.unwrap_or_else(|| UNAUTHORIZED_MESSAGE.into()),
            },
            ApiError::ForbiddenMissingRole { role, path } => ErrorBody {
                code,
                path,
                missing_role: Some(role),
                message: FORBIDDEN_MESSAGE.into(),
            },
            ApiError::BadRequest { message, path, .. }
            | ApiError::NotFound { message, path, .. }
            | ApiError::Conflict { message, path, .. }
            | ApiError::Unavailable { message, path, .. } => ErrorBody { code, path, missing_role: None, message },
            ApiError::Internal { message, path } => ErrorBody {
                code,
                path,
                missing_role: None,
                message: message.unwrap_or_else(|| INTERNAL_MESSAGE.into()),
            },
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(code) {
            resp.headers_mut().insert(ERROR_CODE_HEADER, val);
        }
        resp
    }
}
