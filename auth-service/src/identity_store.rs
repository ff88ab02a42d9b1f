use async_trait::async_trait;
use common_security::{Identity, IdentityLookup, IdentityStore, LookupError, NewIdentity, RegistrationError};
use sqlx::{FromRow, PgPool};
use tracing::warn;

const ACTIVE_STATUS: &str = "ACTIVE";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(FromRow)]
struct UserRow {
    id: String,
    username: String,
    password: String,
    status: String,
}

/// Reads identities from the `users` and `user_roles` tables. Subjects are
/// usernames.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(&self, username: &str) -> Result<Option<Identity>, LookupError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password, status FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let roles: Vec<String> =
            sqlx::query_scalar("SELECT role FROM user_roles WHERE id = $1 ORDER BY role")
                .bind(&row.id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend_error)?;

        let active = row.status.eq_ignore_ascii_case(ACTIVE_STATUS);
        Ok(Some(
            Identity::new(row.username, roles, active).with_password_hash(row.password),
        ))
    }
}

#[derive(FromRow)]
struct ExistingRow {
    username: String,
    email: String,
}

fn backend_error(err: sqlx::Error) -> LookupError {
    warn!(error = %err, "identity query failed");
    LookupError::Backend(err.to_string())
}

#[async_trait]
impl IdentityLookup for PgIdentityStore {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<Identity>, LookupError> {
        self.load(subject).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, LookupError> {
        self.load(username).await
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn register(&self, identity: NewIdentity) -> Result<(), RegistrationError> {
        let existing = sqlx::query_as::<_, ExistingRow>(
            "SELECT username, email FROM users WHERE username = $1 OR lower(email) = lower($2) LIMIT 1",
        )
        .bind(&identity.username)
        .bind(&identity.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        if let Some(row) = existing {
            return Err(if row.username == identity.username {
                RegistrationError::UsernameTaken(identity.username)
            } else {
                RegistrationError::EmailTaken(row.email)
            });
        }

        let mut tx = self.pool.begin().await.map_err(backend_error)?;
        let inserted = sqlx::query(
            "INSERT INTO users (id, username, email, password, first_name, last_name, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&identity.id)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(ACTIVE_STATUS)
        .execute(&mut tx)
        .await;

        if let Err(err) = inserted {
            // A concurrent sign-up won the race for the same username or email.
            if is_unique_violation(&err) {
                return Err(RegistrationError::UsernameTaken(identity.username));
            }
            return Err(backend_error(err).into());
        }

        for role in &identity.roles {
            sqlx::query("INSERT INTO user_roles (id, role) VALUES ($1, $2)")
                .bind(&identity.id)
                .bind(role)
                .execute(&mut tx)
                .await
                .map_err(backend_error)?;
        }

        tx.commit().await.map_err(backend_error)?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false)
}
