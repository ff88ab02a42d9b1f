use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::http::HeaderValue;
use common_auth::{HmacAlgorithm, JwtConfig, ROLE_EMPLOYEE};

pub const DEV_JWT_SECRET: &str =
    "coffeedia-jwt-secret-key-for-development-only-change-in-production";

const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2000;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    /// Set when `JWT_SECRET` is absent and the development secret is in use.
    pub using_dev_secret: bool,
    pub identity_lookup_timeout: Duration,
    pub verify_passwords: bool,
    pub admin_role: String,
    pub database_url: String,
    pub cors_allowed_origins: Vec<String>,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid HOST '{}'", self.host))?;
        Ok(SocketAddr::from((ip, self.port)))
    }
}

pub fn load_app_config() -> Result<AppConfig> {
    app_config_from(|key| env::var(key).ok())
}

/// Builds the configuration from an arbitrary key lookup. Every value is
/// validated here so a bad deployment fails at startup.
pub fn app_config_from<F>(lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

    let (secret, using_dev_secret) = match var("JWT_SECRET") {
        Some(secret) => (secret, false),
        None => (DEV_JWT_SECRET.to_string(), true),
    };

    let algorithm = var("JWT_ALGORITHM")
        .map(|value| value.parse::<HmacAlgorithm>())
        .transpose()
        .context("Failed to parse JWT_ALGORITHM")?
        .unwrap_or_default();

    let mut jwt = JwtConfig::new(secret).with_algorithm(algorithm);
    if let Some(seconds) = parse_number::<i64>(&var, "JWT_ACCESS_TOKEN_VALIDITY_SECONDS")? {
        jwt = jwt.with_access_ttl(seconds);
    }
    if let Some(seconds) = parse_number::<i64>(&var, "JWT_REFRESH_TOKEN_VALIDITY_SECONDS")? {
        jwt = jwt.with_refresh_ttl(seconds);
    }
    jwt.validate().context("Invalid JWT configuration")?;

    let timeout_ms = parse_number::<u64>(&var, "AUTH_IDENTITY_LOOKUP_TIMEOUT_MS")?
        .unwrap_or(DEFAULT_LOOKUP_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(anyhow!("AUTH_IDENTITY_LOOKUP_TIMEOUT_MS must be positive"));
    }

    let verify_passwords = var("AUTH_VERIFY_PASSWORDS")
        .map(|value| parse_bool(&value))
        .unwrap_or(false);

    let admin_role = var("AUTH_ADMIN_ROLE")
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_else(|| ROLE_EMPLOYEE.to_string());

    let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let cors_allowed_origins =
        parse_origins(&var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.into()))
            .context("Failed to parse CORS_ALLOWED_ORIGINS")?;

    let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
    let port = parse_number::<u16>(&var, "PORT")?.unwrap_or(8080);

    Ok(AppConfig {
        jwt,
        using_dev_secret,
        identity_lookup_timeout: Duration::from_millis(timeout_ms),
        verify_passwords,
        admin_role,
        database_url,
        cors_allowed_origins,
        host,
        port,
    })
}

fn parse_number<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|err| anyhow!("Invalid {key} '{value}': {err}"))
        })
        .transpose()
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_origins(value: &str) -> Result<Vec<String>> {
    let mut origins = Vec::new();
    for item in value.split(|c| c == ',' || c == ';' || c == ' ') {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        HeaderValue::from_str(trimmed).map_err(|err| anyhow!("Invalid origin '{trimmed}': {err}"))?;
        origins.push(trimmed.to_string());
    }
    Ok(origins)
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
