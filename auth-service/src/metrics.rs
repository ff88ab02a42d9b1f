use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    refresh_attempts: IntCounterVec,
    signup_attempts: IntCounterVec,
    token_validations: IntCounterVec,
}

impl AuthMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "auth_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let refresh_attempts = IntCounterVec::new(
            Opts::new(
                "auth_refresh_attempts_total",
                "Count of token refresh attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(refresh_attempts.clone()))?;

        let signup_attempts = IntCounterVec::new(
            Opts::new(
                "auth_signup_attempts_total",
                "Count of sign-up attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(signup_attempts.clone()))?;

        let token_validations = IntCounterVec::new(
            Opts::new(
                "auth_token_validations_total",
                "Count of token introspection requests grouped by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(token_validations.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            refresh_attempts,
            signup_attempts,
            token_validations,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn refresh_attempt(&self, outcome: &str) {
        self.refresh_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn signup_attempt(&self, outcome: &str) {
        self.signup_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn token_validation(&self, valid: bool) {
        let result = if valid { "valid" } else { "invalid" };
        self.token_validations.with_label_values(&[result]).inc();
    }

    pub fn login_count(&self, outcome: &str) -> u64 {
        self.login_attempts.with_label_values(&[outcome]).get()
    }

    pub fn refresh_count(&self, outcome: &str) -> u64 {
        self.refresh_attempts.with_label_values(&[outcome]).get()
    }

    pub fn signup_count(&self, outcome: &str) -> u64 {
        self.signup_attempts.with_label_values(&[outcome]).get()
    }

    /// Service counters followed by the process-wide registry, which holds
    /// the shared HTTP error metrics.
    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let mut metric_families = self.registry.gather();
        metric_families.extend(prometheus::gather());
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
