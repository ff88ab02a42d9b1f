use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::claims::Claims;
use crate::codec::TokenCodec;
use crate::config::JwtConfig;
use crate::error::{AuthResult, TokenError};

/// Builds access and refresh tokens. Pure given `now`.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>, config: &JwtConfig) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self {
            codec,
            access_ttl: config.access_ttl()?,
            refresh_ttl: config.refresh_ttl()?,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Access tokens snapshot the identity's roles at issuance time.
    pub fn issue_access_token(
        &self,
        subject: &str,
        roles: &[String],
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let issued_at = truncate_to_seconds(now);
        let expires_at = expiry(issued_at, self.access_ttl)?;
        let claims = Claims::access(subject, roles.to_vec(), issued_at, expires_at);
        self.codec.encode(&claims)
    }

    pub fn issue_refresh_token(
        &self,
        subject: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let issued_at = truncate_to_seconds(now);
        let expires_at = expiry(issued_at, self.refresh_ttl)?;
        let claims = Claims::refresh(subject, issued_at, expires_at);
        self.codec.encode(&claims)
    }
}

fn expiry(issued_at: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, TokenError> {
    issued_at.checked_add_signed(ttl).ok_or_else(|| {
        TokenError::Encoding(format!(
            "expiry overflows: issued at {} plus {}s",
            issued_at.timestamp(),
            ttl.num_seconds()
        ))
    })
}

// Encoded timestamps carry whole seconds only; truncating here keeps the
// issued window exactly `ttl` long.
fn truncate_to_seconds(value: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(value.timestamp(), 0)
        .single()
        .unwrap_or(value)
}
