use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use common_auth::{
    parse_bearer_str, AuthError, AuthResult, Clock, TokenIssuer, TokenValidator, ROLE_CUSTOMER,
};
use common_security::{
    find_subject_within, find_username_within, Identity, IdentityStore, LookupError, NewIdentity,
    RegistrationError, DEFAULT_LOOKUP_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::credentials::{hash_password, CredentialVerifier};
use crate::metrics::AuthMetrics;

const PASSWORD_SPECIALS: &str = "@$!%*?&";

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Response of a successful login or refresh.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Configured access-token lifetime in seconds.
    pub expires_in: i64,
    pub username: String,
    pub roles: Vec<String>,
}

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// The account created by a successful sign-up.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
}

impl From<&NewIdentity> for SignUpResponse {
    fn from(identity: &NewIdentity) -> Self {
        let parts: Vec<&str> = [identity.first_name.as_deref(), identity.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        Self {
            id: identity.id.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            full_name: (!parts.is_empty()).then(|| parts.join(" ")),
        }
    }
}

/// Credential exchange: sign-up, login, refresh, logout and token
/// introspection. Holds no state between calls.
pub struct AuthenticationService {
    issuer: Arc<TokenIssuer>,
    validator: Arc<TokenValidator>,
    identities: Arc<dyn IdentityStore>,
    credentials: Arc<dyn CredentialVerifier>,
    clock: Arc<dyn Clock>,
    metrics: Arc<AuthMetrics>,
    lookup_timeout: Duration,
}

impl AuthenticationService {
    pub fn new(
        issuer: Arc<TokenIssuer>,
        validator: Arc<TokenValidator>,
        identities: Arc<dyn IdentityStore>,
        credentials: Arc<dyn CredentialVerifier>,
        clock: Arc<dyn Clock>,
        metrics: Arc<AuthMetrics>,
    ) -> Self {
        Self {
            issuer,
            validator,
            identities,
            credentials,
            clock,
            metrics,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Creates an active `customer` account with an Argon2-hashed password.
    pub async fn sign_up(&self, request: SignUpRequest) -> AuthResult<SignUpResponse> {
        let username = request.username.trim().to_string();
        let result = self.try_sign_up(request).await;
        self.metrics.signup_attempt(match &result {
            Ok(_) => "success",
            Err(AuthError::InvalidRequest(_)) => "invalid_request",
            Err(AuthError::AlreadyExists(_)) => "conflict",
            Err(_) => "error",
        });
        match &result {
            Ok(created) => info!(subject = %created.username, id = %created.id, outcome = "success", "sign-up"),
            Err(err) => warn!(subject = %username, reason = %err, "sign-up rejected"),
        }
        result
    }

    async fn try_sign_up(&self, request: SignUpRequest) -> AuthResult<SignUpResponse> {
        validate_sign_up(&request)?;
        let identity = NewIdentity {
            id: Uuid::new_v4().to_string(),
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password_hash: hash_password(&request.password)?,
            first_name: optional_name(request.first_name),
            last_name: optional_name(request.last_name),
            roles: vec![ROLE_CUSTOMER.to_string()],
        };

        tokio::time::timeout(self.lookup_timeout, self.identities.register(identity.clone()))
            .await
            .map_err(|_| lookup_failure(LookupError::Timeout))?
            .map_err(registration_failure)?;

        Ok(SignUpResponse::from(&identity))
    }

    pub async fn login(&self, username: &str, password: &str) -> AuthResult<TokenBundle> {
        let result = self.try_login(username, password).await;
        self.metrics.login_attempt(outcome_label(&result));
        match &result {
            Ok(_) => info!(subject = %username, outcome = "success", "login"),
            Err(err) => warn!(subject = %username, outcome = outcome_label(&result), reason = %err, "login rejected"),
        }
        result
    }

    async fn try_login(&self, username: &str, password: &str) -> AuthResult<TokenBundle> {
        let identity = find_username_within(self.identities.as_ref(), username, self.lookup_timeout)
            .await
            .map_err(lookup_failure)?
            .ok_or_else(|| AuthError::UserNotFound(username.to_string()))?;

        self.ensure_active(&identity)?;
        self.credentials.verify(&identity, password)?;
        self.issue_bundle(&identity)
    }

    /// Exchanges a valid refresh token for a fresh pair. Invalid, expired and
    /// access-typed tokens fail with the same error.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenBundle> {
        let result = self.try_refresh(refresh_token).await;
        self.metrics.refresh_attempt(match &result {
            Err(AuthError::Unauthorized(message)) if message == INVALID_REFRESH_TOKEN => {
                "invalid_token"
            }
            other => outcome_label(other),
        });
        match &result {
            Ok(bundle) => info!(subject = %bundle.username, outcome = "success", "token refresh"),
            Err(err) => warn!(reason = %err, "token refresh rejected"),
        }
        result
    }

    async fn try_refresh(&self, refresh_token: &str) -> AuthResult<TokenBundle> {
        let Some(claims) = self.validator.refresh_claims(refresh_token) else {
            return Err(AuthError::unauthorized(INVALID_REFRESH_TOKEN));
        };

        let identity =
            find_subject_within(self.identities.as_ref(), &claims.subject, self.lookup_timeout)
                .await
                .map_err(lookup_failure)?
                .ok_or_else(|| AuthError::UserNotFound(claims.subject.clone()))?;

        self.ensure_active(&identity)?;
        self.issue_bundle(&identity)
    }

    /// Tokens stay valid until they expire; logout only records the event.
    pub fn logout(&self, subject: &str) {
        info!(subject = %subject, "logout");
    }

    /// `true` only for a `Bearer ` header carrying a currently valid token of
    /// either type.
    pub fn validate_bearer_header(&self, header: Option<&str>) -> bool {
        let valid = header
            .and_then(|value| parse_bearer_str(value).ok())
            .map(|token| self.validator.validate(&token))
            .unwrap_or(false);
        self.metrics.token_validation(valid);
        valid
    }

    fn ensure_active(&self, identity: &Identity) -> AuthResult<()> {
        if self.identities.active_status(identity) {
            Ok(())
        } else {
            Err(AuthError::unauthorized(INACTIVE_USER))
        }
    }

    fn issue_bundle(&self, identity: &Identity) -> AuthResult<TokenBundle> {
        let now = self.clock.now();
        let access_token = self
            .issuer
            .issue_access_token(&identity.subject, &identity.roles, now)
            .map_err(signing_failure)?;
        let refresh_token = self
            .issuer
            .issue_refresh_token(&identity.subject, now)
            .map_err(signing_failure)?;

        Ok(TokenBundle {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER,
            expires_in: self.issuer.access_ttl().num_seconds(),
            username: identity.subject.clone(),
            roles: identity.roles.clone(),
        })
    }
}

const INVALID_REFRESH_TOKEN: &str = "invalid refresh token";
const INACTIVE_USER: &str = "user is inactive";

fn lookup_failure(err: LookupError) -> AuthError {
    warn!(reason = %err, "identity lookup failed");
    AuthError::IdentityUnavailable
}

fn registration_failure(err: RegistrationError) -> AuthError {
    match err {
        RegistrationError::Store(err) => lookup_failure(err),
        taken => AuthError::AlreadyExists(taken.to_string()),
    }
}

fn invalid(message: impl Into<String>) -> AuthError {
    AuthError::InvalidRequest(message.into())
}

fn optional_name(value: Option<String>) -> Option<String> {
    value
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

fn validate_sign_up(request: &SignUpRequest) -> AuthResult<()> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(invalid("username must not be blank"));
    }
    if !(3..=20).contains(&username.chars().count())
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid(
            "username must be 3 to 20 letters, digits, underscores or hyphens",
        ));
    }

    let email = request.email.trim();
    if email.is_empty() {
        return Err(invalid("email must not be blank"));
    }
    if !is_plausible_email(email) {
        return Err(invalid("email is not a valid address"));
    }

    let password = request.password.as_str();
    if password.is_empty() {
        return Err(invalid("password must not be blank"));
    }
    if !(8..=100).contains(&password.chars().count()) {
        return Err(invalid("password must be 8 to 100 characters"));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c);
    let strong = password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
        && password.chars().all(allowed);
    if !strong {
        return Err(invalid(format!(
            "password needs an upper-case letter, a lower-case letter, a digit and one of {PASSWORD_SPECIALS}"
        )));
    }

    if request.confirm_password.is_empty() {
        return Err(invalid("confirmPassword must not be blank"));
    }
    if request.password != request.confirm_password {
        return Err(invalid("password and confirmation do not match"));
    }

    for (field, value) in [("firstName", &request.first_name), ("lastName", &request.last_name)] {
        if value.as_deref().map(|name| name.trim().chars().count() > 50).unwrap_or(false) {
            return Err(invalid(format!("{field} must be at most 50 characters")));
        }
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn signing_failure(err: common_auth::TokenError) -> AuthError {
    error!(error = %err, "failed to sign token");
    AuthError::Internal(err.to_string())
}

fn outcome_label<T>(result: &AuthResult<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(AuthError::UserNotFound(_)) => "user_not_found",
        Err(AuthError::Unauthorized(message)) if message == INACTIVE_USER => "inactive",
        Err(AuthError::Unauthorized(_)) => "invalid_credentials",
        Err(_) => "error",
    }
}
