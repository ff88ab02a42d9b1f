use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_auth::{AuthError, AuthResult};
use common_http_errors::{ApiError, ApiResult};
use common_security::{CurrentIdentity, SecurityContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::metrics::AuthMetrics;
use crate::service::{AuthenticationService, SignUpRequest, SignUpResponse, TokenBundle};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub username: String,
    pub roles: Vec<String>,
    pub authorities: Vec<String>,
    pub active: bool,
}

pub async fn sign_up(
    State(auth): State<Arc<AuthenticationService>>,
    uri: Uri,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SignUpResponse>)> {
    let Json(request) = payload.map_err(|rejection| malformed(rejection, &uri))?;
    let created = auth.sign_up(request).await.map_err(|err| err.at(uri.path()))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn login(
    State(auth): State<Arc<AuthenticationService>>,
    uri: Uri,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<TokenBundle>> {
    let Json(request) = payload.map_err(|rejection| malformed(rejection, &uri))?;
    let at_path = |err: AuthError| err.at(uri.path());
    let username = require_field("username", &request.username).map_err(at_path)?;
    require_field("password", &request.password).map_err(at_path)?;
    auth.login(username, &request.password)
        .await
        .map(Json)
        .map_err(at_path)
}

pub async fn refresh(
    State(auth): State<Arc<AuthenticationService>>,
    uri: Uri,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> ApiResult<Json<TokenBundle>> {
    let Json(request) = payload.map_err(|rejection| malformed(rejection, &uri))?;
    let at_path = |err: AuthError| err.at(uri.path());
    let token = require_field("refreshToken", &request.refresh_token).map_err(at_path)?;
    auth.refresh(token).await.map(Json).map_err(at_path)
}

/// Always 200; the body says whether the presented bearer token is valid.
pub async fn validate(
    State(auth): State<Arc<AuthenticationService>>,
    headers: HeaderMap,
) -> Json<ValidationResponse> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    Json(ValidationResponse {
        valid: auth.validate_bearer_header(header),
    })
}

pub async fn logout(
    State(auth): State<Arc<AuthenticationService>>,
    CurrentIdentity(identity): CurrentIdentity,
) -> StatusCode {
    auth.logout(&identity.subject);
    StatusCode::OK
}

pub async fn me(ctx: SecurityContext, CurrentIdentity(identity): CurrentIdentity) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        authorities: ctx.authorities().iter().cloned().collect(),
        username: identity.subject,
        roles: identity.roles,
        active: identity.active,
    })
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn prometheus_metrics(State(metrics): State<Arc<AuthMetrics>>, uri: Uri) -> Response {
    match metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            AuthError::Internal(err.to_string()).at(uri.path()).into_response()
        }
    }
}

fn malformed(rejection: JsonRejection, uri: &Uri) -> ApiError {
    debug!(path = %uri.path(), reason = %rejection.body_text(), "rejected request body");
    ApiError::bad_request("invalid_request", rejection.body_text()).with_path(uri.path())
}

fn require_field<'a>(name: &str, value: &'a str) -> AuthResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AuthError::InvalidRequest(format!("{name} must not be blank")))
    } else {
        Ok(trimmed)
    }
}
