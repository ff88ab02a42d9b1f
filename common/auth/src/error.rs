use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Decode/encode-level failures. These never leave the token validator:
/// validation queries collapse them to `false`, identity resolution maps them
/// to [`AuthError::Unauthorized`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("invalid claim '{0}': {1}")]
    InvalidClaims(&'static str, String),
    #[error("failed to sign token: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match value.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed(value.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("identity store unavailable")]
    IdentityUnavailable,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("signing secret for {algorithm} must be at least {required} bytes (got {actual})")]
    WeakSecret {
        algorithm: &'static str,
        required: usize,
        actual: usize,
    },
    #[error("invalid token configuration: {0}")]
    InvalidConfig(String),
    #[error("internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn status(&self) -> StatusCode {
        envelope(self).status()
    }

    pub fn code(&self) -> &'static str {
        envelope(self).code()
    }

    /// Renders through the shared envelope, tagged with the request path.
    pub fn at(self, path: impl Into<String>) -> ApiError {
        ApiError::from(self).with_path(path)
    }
}

fn envelope(err: &AuthError) -> ApiError {
    let message = err.to_string();
    match err {
        AuthError::Unauthorized(_)
        | AuthError::MissingAuthorization
        | AuthError::InvalidAuthorization => ApiError::Unauthorized {
            path: None,
            message: Some(message),
        },
        AuthError::UserNotFound(_) => ApiError::NotFound {
            code: "user_not_found",
            message,
            path: None,
        },
        AuthError::AlreadyExists(_) => ApiError::Conflict {
            code: "user_exists",
            message,
            path: None,
        },
        AuthError::InvalidRequest(_) => ApiError::BadRequest {
            code: "invalid_request",
            message,
            path: None,
        },
        AuthError::IdentityUnavailable => ApiError::Unavailable {
            code: "identity_unavailable",
            message,
            path: None,
        },
        // Configuration and signing details stay in the logs.
        AuthError::WeakSecret { .. } | AuthError::InvalidConfig(_) | AuthError::Internal(_) => {
            ApiError::Internal {
                message: Some("Authentication is temporarily unavailable.".to_string()),
                path: None,
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        envelope(&err)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
