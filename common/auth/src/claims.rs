use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// Which role a signed token plays. Access and refresh tokens are never
/// interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-focused representation of the claims carried by a token.
///
/// Timestamps have whole-second resolution once encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub token_type: TokenType,
    /// Present on access tokens only.
    pub roles: Option<Vec<String>>,
}

impl Claims {
    pub fn access(
        subject: impl Into<String>,
        roles: Vec<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: subject.into(),
            issued_at,
            expires_at,
            token_type: TokenType::Access,
            roles: Some(roles),
        }
    }

    pub fn refresh(
        subject: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: subject.into(),
            issued_at,
            expires_at,
            token_type: TokenType::Refresh,
            roles: None,
        }
    }

    pub fn is_access(&self) -> bool {
        self.token_type == TokenType::Access
    }

    pub fn is_refresh(&self) -> bool {
        self.token_type == TokenType::Refresh
    }

    /// Roles snapshot taken at issuance; empty for refresh tokens.
    pub fn roles(&self) -> &[String] {
        self.roles.as_deref().unwrap_or(&[])
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|value| value == role)
    }

    /// Expiry is exclusive: a token expiring exactly at `now` is no longer valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub(crate) fn check_invariants(&self) -> Result<(), TokenError> {
        if self.subject.trim().is_empty() {
            return Err(TokenError::InvalidClaims("sub", "empty subject".into()));
        }
        if self.expires_at <= self.issued_at {
            return Err(TokenError::InvalidClaims(
                "exp",
                format!(
                    "expiry {} is not after issuance {}",
                    self.expires_at.timestamp(),
                    self.issued_at.timestamp()
                ),
            ));
        }
        if self.token_type == TokenType::Refresh && self.roles.is_some() {
            return Err(TokenError::InvalidClaims(
                "roles",
                "refresh tokens must not carry roles".into(),
            ));
        }
        Ok(())
    }
}

/// On-the-wire claim set.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClaimsRepr {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "tokenType")]
    pub token_type: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl From<&Claims> for ClaimsRepr {
    fn from(value: &Claims) -> Self {
        Self {
            sub: value.subject.clone(),
            iat: value.issued_at.timestamp(),
            exp: value.expires_at.timestamp(),
            token_type: value.token_type,
            roles: value.roles.clone(),
        }
    }
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = TokenError;

    fn try_from(value: ClaimsRepr) -> Result<Self, TokenError> {
        let issued_at = Utc
            .timestamp_opt(value.iat, 0)
            .single()
            .ok_or_else(|| TokenError::InvalidClaims("iat", value.iat.to_string()))?;
        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| TokenError::InvalidClaims("exp", value.exp.to_string()))?;

        let claims = Self {
            subject: value.sub,
            issued_at,
            expires_at,
            token_type: value.token_type,
            roles: value.roles,
        };
        claims.check_invariants()?;
        Ok(claims)
    }
}
