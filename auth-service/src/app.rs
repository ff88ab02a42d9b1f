use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::FromRef;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use common_auth::{Clock, JwtConfig, TokenCodec, TokenIssuer, TokenValidator};
use common_http_errors::http_error_metrics_layer;
use common_security::{protect, Authenticator, IdentityLookup, IdentityStore, RoutePolicy};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::credentials::CredentialVerifier;
use crate::handlers;
use crate::metrics::AuthMetrics;
use crate::service::AuthenticationService;

pub const SERVICE_NAME: &str = "coffeedia-auth";

/// Paths served without authentication.
pub const PUBLIC_PATHS: &[&str] = &[
    "/api/auth/signup",
    "/api/auth/login",
    "/api/auth/refresh",
    "/api/auth/validate",
    "/api/health",
    "/actuator/**",
    "/swagger-ui/**",
    "/v3/api-docs/**",
    "/favicon.ico",
];

pub fn default_route_policy(admin_role: &str) -> RoutePolicy {
    RoutePolicy::new()
        .permit_all(PUBLIC_PATHS.iter().copied())
        .require_role("/api/admin/**", admin_role)
}

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthenticationService>,
    pub validator: Arc<TokenValidator>,
    pub metrics: Arc<AuthMetrics>,
    pub authenticator: Authenticator,
}

impl FromRef<AppState> for Arc<AuthenticationService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for Arc<TokenValidator> {
    fn from_ref(state: &AppState) -> Self {
        state.validator.clone()
    }
}

impl FromRef<AppState> for Arc<AuthMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

impl AppState {
    /// Wires the token components, the authentication service and the
    /// request authenticator around one signing key and one identity store.
    pub fn new<S>(
        jwt: &JwtConfig,
        store: Arc<S>,
        credentials: Arc<dyn CredentialVerifier>,
        clock: Arc<dyn Clock>,
        policy: RoutePolicy,
        lookup_timeout: Duration,
    ) -> Result<Self>
    where
        S: IdentityStore + 'static,
    {
        let identities: Arc<dyn IdentityLookup> = store.clone();
        let codec = Arc::new(TokenCodec::from_config(jwt).context("Invalid JWT configuration")?);
        let issuer = Arc::new(TokenIssuer::new(codec.clone(), jwt).context("Invalid JWT configuration")?);
        let validator = Arc::new(TokenValidator::new(codec, clock.clone()));
        let metrics = Arc::new(AuthMetrics::new().context("Failed to register auth metrics")?);

        let auth = AuthenticationService::new(
            issuer,
            validator.clone(),
            store,
            credentials,
            clock,
            metrics.clone(),
        )
        .with_lookup_timeout(lookup_timeout);

        let authenticator = Authenticator::new(validator.clone(), identities, Arc::new(policy))
            .with_lookup_timeout(lookup_timeout);

        Ok(Self {
            auth: Arc::new(auth),
            validator,
            metrics,
            authenticator,
        })
    }
}

/// Auth endpoints plus the embedding application's `routes`, all behind
/// CORS, error metrics, authentication and authorization (outermost first).
pub fn build_router(state: AppState, cors_origins: &[String], routes: Router<AppState>) -> Router {
    let api = Router::new()
        .route("/api/auth/signup", post(handlers::sign_up))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/refresh", post(handlers::refresh))
        .route("/api/auth/validate", post(handlers::validate))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/me", get(handlers::me))
        .route("/api/health", get(handlers::health))
        .route("/actuator/health", get(handlers::health))
        .route("/actuator/prometheus", get(handlers::prometheus_metrics))
        .merge(routes);

    protect(api, state.authenticator.clone())
        .layer(from_fn(http_error_metrics_layer(SERVICE_NAME)))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
}
