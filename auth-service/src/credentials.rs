use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use common_auth::{AuthError, AuthResult};
use common_security::Identity;
use rand_core::OsRng;
use tracing::warn;

/// Password check run by login after the identity is known to be active.
pub trait CredentialVerifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn verify(&self, identity: &Identity, password: &str) -> AuthResult<()>;
}

/// Accepts any password for an existing, active identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustIdentity;

impl CredentialVerifier for TrustIdentity {
    fn name(&self) -> &'static str {
        "trust"
    }

    fn verify(&self, _identity: &Identity, _password: &str) -> AuthResult<()> {
        Ok(())
    }
}

/// Verifies against the identity's stored Argon2 PHC string.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

impl CredentialVerifier for Argon2Verifier {
    fn name(&self) -> &'static str {
        "argon2"
    }

    fn verify(&self, identity: &Identity, password: &str) -> AuthResult<()> {
        let Some(stored) = identity.password_hash.as_deref() else {
            warn!(subject = %identity.subject, "no password hash on record");
            return Err(invalid_credentials());
        };

        let parsed = PasswordHash::new(stored).map_err(|err| {
            warn!(subject = %identity.subject, error = %err, "stored password hash is not a PHC string");
            invalid_credentials()
        })?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| invalid_credentials())
    }
}

pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Internal(format!("failed to hash password: {err}")))
}

fn invalid_credentials() -> AuthError {
    AuthError::unauthorized("invalid credentials")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_mode_accepts_anything() {
        let identity = Identity::new("bjorn", ["customer"], true);
        assert!(TrustIdentity.verify(&identity, "anypass").is_ok());
    }

    #[test]
    fn argon2_accepts_matching_password_only() {
        let hash = hash_password("CorrectHorseBatteryStaple!").expect("hash");
        let identity = Identity::new("bjorn", ["customer"], true).with_password_hash(hash);

        assert!(Argon2Verifier
            .verify(&identity, "CorrectHorseBatteryStaple!")
            .is_ok());
        let err = Argon2Verifier
            .verify(&identity, "wrong")
            .expect_err("mismatch");
        assert!(matches!(err, AuthError::Unauthorized(message) if message == "invalid credentials"));
    }

    #[test]
    fn argon2_rejects_missing_or_legacy_hashes() {
        let bare = Identity::new("bjorn", ["customer"], true);
        assert!(Argon2Verifier.verify(&bare, "anything").is_err());

        let legacy = bare.with_password_hash("$2a$10$notargon");
        assert!(Argon2Verifier.verify(&legacy, "anything").is_err());
    }
}
