use std::sync::Arc;

use tracing::debug;

use crate::claims::Claims;
use crate::clock::Clock;
use crate::codec::TokenCodec;
use crate::error::{AuthError, AuthResult, TokenError};

/// Answers validity questions about presented tokens.
///
/// Queries never fail: any decode problem becomes `false` (or `None`). Only
/// [`TokenValidator::subject_of`] surfaces a typed error, and it uses the
/// `Unauthorized` taxonomy rather than the raw decode failure.
#[derive(Clone)]
pub struct TokenValidator {
    codec: Arc<TokenCodec>,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(codec: Arc<TokenCodec>, clock: Arc<dyn Clock>) -> Self {
        Self { codec, clock }
    }

    fn inspect(&self, token: &str) -> Result<Claims, TokenError> {
        self.codec.decode(token, self.clock.now()).map_err(|err| {
            debug!(reason = %err, "token rejected");
            err
        })
    }

    /// Signature verifies and the token has not reached its expiry.
    pub fn validate(&self, token: &str) -> bool {
        self.inspect(token).is_ok()
    }

    pub fn is_access_token(&self, token: &str) -> bool {
        self.inspect(token).map(|claims| claims.is_access()).unwrap_or(false)
    }

    pub fn is_refresh_token(&self, token: &str) -> bool {
        self.inspect(token).map(|claims| claims.is_refresh()).unwrap_or(false)
    }

    /// Claims of a valid access token; `None` for anything else, including
    /// valid refresh tokens.
    pub fn access_claims(&self, token: &str) -> Option<Claims> {
        self.inspect(token).ok().filter(Claims::is_access)
    }

    /// Claims of a valid refresh token; `None` for anything else.
    pub fn refresh_claims(&self, token: &str) -> Option<Claims> {
        self.inspect(token).ok().filter(Claims::is_refresh)
    }

    pub fn subject_of(&self, token: &str) -> AuthResult<String> {
        self.inspect(token)
            .map(|claims| claims.subject)
            .map_err(|err| match err {
                TokenError::Expired => AuthError::unauthorized("token has expired"),
                _ => AuthError::unauthorized("invalid token"),
            })
    }

    /// Role snapshot of an access token. Empty for refresh tokens and for
    /// tokens that fail validation.
    pub fn roles_of(&self, token: &str) -> Vec<String> {
        self.inspect(token)
            .ok()
            .and_then(|claims| claims.roles)
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
