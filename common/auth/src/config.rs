use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use jsonwebtoken::Algorithm;

use crate::error::AuthError;

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 3_600;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 86_400;
/// Longest lifetime accepted for either token type (ten years).
pub const MAX_TTL_SECONDS: i64 = 10 * 365 * 86_400;

/// HMAC family used to sign tokens. The secret must be at least as long as
/// the digest output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HmacAlgorithm {
    #[default]
    Hs256,
    Hs384,
    Hs512,
}

impl HmacAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HmacAlgorithm::Hs256 => "HS256",
            HmacAlgorithm::Hs384 => "HS384",
            HmacAlgorithm::Hs512 => "HS512",
        }
    }

    pub fn min_secret_len(&self) -> usize {
        match self {
            HmacAlgorithm::Hs256 => 32,
            HmacAlgorithm::Hs384 => 48,
            HmacAlgorithm::Hs512 => 64,
        }
    }

    pub(crate) fn jwt_algorithm(&self) -> Algorithm {
        match self {
            HmacAlgorithm::Hs256 => Algorithm::HS256,
            HmacAlgorithm::Hs384 => Algorithm::HS384,
            HmacAlgorithm::Hs512 => Algorithm::HS512,
        }
    }
}

impl FromStr for HmacAlgorithm {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(HmacAlgorithm::Hs256),
            "HS384" => Ok(HmacAlgorithm::Hs384),
            "HS512" => Ok(HmacAlgorithm::Hs512),
            other => Err(AuthError::InvalidConfig(format!(
                "unsupported signing algorithm '{other}'. Use HS256, HS384, or HS512."
            ))),
        }
    }
}

/// Runtime configuration for signing and verifying tokens. Built once at
/// startup and shared immutably afterwards.
#[derive(Clone)]
pub struct JwtConfig {
    secret: String,
    pub algorithm: HmacAlgorithm,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

impl JwtConfig {
    /// Construct config with default lifetimes (1 hour access, 24 hours refresh).
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: HmacAlgorithm::default(),
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    pub fn with_algorithm(mut self, algorithm: HmacAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_access_ttl(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    pub fn with_refresh_ttl(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn access_ttl(&self) -> Result<Duration, AuthError> {
        lifetime("access", self.access_ttl_seconds)
    }

    pub fn refresh_ttl(&self) -> Result<Duration, AuthError> {
        lifetime("refresh", self.refresh_ttl_seconds)
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        let required = self.algorithm.min_secret_len();
        let actual = self.secret.as_bytes().len();
        if actual < required {
            return Err(AuthError::WeakSecret {
                algorithm: self.algorithm.as_str(),
                required,
                actual,
            });
        }
        self.access_ttl()?;
        self.refresh_ttl()?;
        Ok(())
    }
}

fn lifetime(kind: &str, seconds: i64) -> Result<Duration, AuthError> {
    if seconds <= 0 {
        return Err(AuthError::InvalidConfig(format!(
            "{kind} token lifetime must be positive"
        )));
    }
    if seconds > MAX_TTL_SECONDS {
        return Err(AuthError::InvalidConfig(format!(
            "{kind} token lifetime must not exceed {MAX_TTL_SECONDS} seconds"
        )));
    }
    Duration::try_seconds(seconds).ok_or_else(|| {
        AuthError::InvalidConfig(format!("{kind} token lifetime is out of range"))
    })
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_algorithm_case_insensitively() {
        assert_eq!("hs384".parse::<HmacAlgorithm>().unwrap(), HmacAlgorithm::Hs384);
        assert!("RS256".parse::<HmacAlgorithm>().is_err());
    }

    #[test]
    fn validate_enforces_secret_length_per_algorithm() {
        let secret = "x".repeat(40);
        assert!(JwtConfig::new(secret.clone()).validate().is_ok());

        let err = JwtConfig::new(secret)
            .with_algorithm(HmacAlgorithm::Hs512)
            .validate()
            .expect_err("40 bytes is too short for HS512");
        match err {
            AuthError::WeakSecret {
                algorithm,
                required,
                actual,
            } => {
                assert_eq!(algorithm, "HS512");
                assert_eq!(required, 64);
                assert_eq!(actual, 40);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_non_positive_lifetimes() {
        let config = JwtConfig::new("x".repeat(32)).with_refresh_ttl(0);
        assert!(matches!(config.validate(), Err(AuthError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_lifetimes_beyond_the_maximum() {
        let huge = JwtConfig::new("x".repeat(32)).with_access_ttl(i64::MAX);
        assert!(matches!(huge.validate(), Err(AuthError::InvalidConfig(_))));
        assert!(huge.access_ttl().is_err());

        let overflowing = JwtConfig::new("x".repeat(32)).with_refresh_ttl(10_000_000_000_000);
        assert!(matches!(overflowing.validate(), Err(AuthError::InvalidConfig(_))));

        let longest = JwtConfig::new("x".repeat(32))
            .with_access_ttl(MAX_TTL_SECONDS)
            .with_refresh_ttl(MAX_TTL_SECONDS);
        assert!(longest.validate().is_ok());
        assert_eq!(longest.refresh_ttl().unwrap(), Duration::seconds(MAX_TTL_SECONDS));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", JwtConfig::new("super-secret-value-that-is-long-enough"));
        assert!(!rendered.contains("super-secret"));
    }
}
