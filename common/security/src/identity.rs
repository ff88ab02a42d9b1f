use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common_auth::authority_for_role;
use thiserror::Error;

/// A subject's stable record as held by the user store. Read-only here.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    /// Ordered and free of duplicates.
    pub roles: Vec<String>,
    pub active: bool,
    pub password_hash: Option<String>,
}

impl Identity {
    pub fn new<I, R>(subject: impl Into<String>, roles: I, active: bool) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for role in roles {
            let role = role.into();
            if !ordered.contains(&role) {
                ordered.push(role);
            }
        }
        Self {
            subject: subject.into(),
            roles: ordered,
            active,
            password_hash: None,
        }
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|value| value == role)
    }

    pub fn authorities(&self) -> BTreeSet<String> {
        self.roles.iter().map(|role| authority_for_role(role)).collect()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("subject", &self.subject)
            .field("roles", &self.roles)
            .field("active", &self.active)
            .field(
                "password_hash",
                &self.password_hash.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("identity store error: {0}")]
    Backend(String),
    #[error("identity lookup timed out")]
    Timeout,
}

/// Resolves subjects and usernames to identities.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<Identity>, LookupError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, LookupError>;

    fn active_status(&self, identity: &Identity) -> bool {
        identity.active
    }
}

/// Account data for a new registration. The password is already hashed.
#[derive(Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
}

impl NewIdentity {
    pub fn to_identity(&self) -> Identity {
        Identity::new(self.username.clone(), self.roles.iter().cloned(), true)
            .with_password_hash(self.password_hash.clone())
    }
}

impl fmt::Debug for NewIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewIdentity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("email '{0}' is already registered")]
    EmailTaken(String),
    #[error(transparent)]
    Store(#[from] LookupError),
}

/// Identity lookup plus the write path used by sign-up. New identities are
/// created active.
#[async_trait]
pub trait IdentityStore: IdentityLookup {
    async fn register(&self, identity: NewIdentity) -> Result<(), RegistrationError>;
}

/// Runs a subject lookup bounded by `timeout`.
pub async fn find_subject_within<L: IdentityLookup + ?Sized>(
    lookup: &L,
    subject: &str,
    timeout: Duration,
) -> Result<Option<Identity>, LookupError> {
    tokio::time::timeout(timeout, lookup.find_by_subject(subject))
        .await
        .map_err(|_| LookupError::Timeout)?
}

/// Runs a username lookup bounded by `timeout`.
pub async fn find_username_within<L: IdentityLookup + ?Sized>(
    lookup: &L,
    username: &str,
    timeout: Duration,
) -> Result<Option<Identity>, LookupError> {
    tokio::time::timeout(timeout, lookup.find_by_username(username))
        .await
        .map_err(|_| LookupError::Timeout)?
}

/// Identity store kept in process memory. Subjects are usernames.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    inner: RwLock<HashMap<String, Identity>>,
    /// Registered email to username.
    emails: RwLock<HashMap<String, String>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(self, identity: Identity) -> Self {
        self.insert(identity);
        self
    }

    pub fn insert(&self, identity: Identity) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(identity.subject.clone(), identity);
    }

    pub fn remove(&self, subject: &str) -> Option<Identity> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut emails = self.emails.write().unwrap_or_else(PoisonError::into_inner);
        emails.retain(|_, username| username != subject);
        guard.remove(subject)
    }

    fn get(&self, subject: &str) -> Option<Identity> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(subject).cloned()
    }
}

#[async_trait]
impl IdentityLookup for InMemoryIdentityStore {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<Identity>, LookupError> {
        Ok(self.get(subject))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, LookupError> {
        Ok(self.get(username))
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn register(&self, identity: NewIdentity) -> Result<(), RegistrationError> {
        let mut users = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut emails = self.emails.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(&identity.username) {
            return Err(RegistrationError::UsernameTaken(identity.username));
        }
        let email = identity.email.to_ascii_lowercase();
        if emails.contains_key(&email) {
            return Err(RegistrationError::EmailTaken(identity.email));
        }
        emails.insert(email, identity.username.clone());
        users.insert(identity.username.clone(), identity.to_identity());
        Ok(())
    }
}
