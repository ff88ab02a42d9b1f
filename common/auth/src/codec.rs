use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::{Claims, ClaimsRepr};
use crate::config::{HmacAlgorithm, JwtConfig};
use crate::error::{AuthResult, TokenError};

/// Symmetric-key signing and parsing of compact tokens.
///
/// Holds only immutable key material, so a single instance can be shared
/// across any number of concurrent requests.
pub struct TokenCodec {
    algorithm: HmacAlgorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Fails fast when the secret is shorter than the algorithm requires.
    pub fn new(secret: &str, algorithm: HmacAlgorithm) -> AuthResult<Self> {
        JwtConfig::new(secret).with_algorithm(algorithm).validate()?;

        // Expiry is checked against the injected clock, not the system time.
        let mut validation = Validation::new(algorithm.jwt_algorithm());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::new();

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn from_config(config: &JwtConfig) -> AuthResult<Self> {
        Self::new(config.secret(), config.algorithm)
    }

    pub fn algorithm(&self) -> HmacAlgorithm {
        self.algorithm
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        claims.check_invariants()?;
        let header = Header::new(self.algorithm.jwt_algorithm());
        encode(&header, &ClaimsRepr::from(claims), &self.encoding_key)
            .map_err(|err| TokenError::Encoding(err.to_string()))
    }

    /// Verifies the signature before any claim is deserialised, then checks
    /// expiry against `now`.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = decode::<ClaimsRepr>(token.trim(), &self.decoding_key, &self.validation)?;
        let claims = Claims::try_from(data.claims)?;
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
