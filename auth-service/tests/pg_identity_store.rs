mod support;

use anyhow::Result;
use coffeedia_auth::identity_store::PgIdentityStore;
use common_security::{IdentityLookup, IdentityStore, NewIdentity, RegistrationError};
use support::TestDatabase;

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres via AUTH_TEST_DATABASE_URL)")]
async fn resolves_users_with_roles_and_status() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();

    sqlx::query("DELETE FROM users WHERE id IN ('u-pg-1', 'u-pg-2')")
        .execute(&pool)
        .await?;
    sqlx::query(
        "INSERT INTO users (id, username, email, password, status) VALUES
         ('u-pg-1', 'pg-bjorn', 'pg-bjorn@example.com', 'hash-1', 'ACTIVE'),
         ('u-pg-2', 'pg-dormant', 'pg-dormant@example.com', 'hash-2', 'INACTIVE')",
    )
    .execute(&pool)
    .await?;
    sqlx::query(
        "INSERT INTO user_roles (id, role) VALUES
         ('u-pg-1', 'employee'), ('u-pg-1', 'customer'), ('u-pg-2', 'customer')",
    )
    .execute(&pool)
    .await?;

    let store = PgIdentityStore::new(pool.clone());

    let bjorn = store
        .find_by_username("pg-bjorn")
        .await?
        .expect("pg-bjorn exists");
    assert_eq!(bjorn.subject, "pg-bjorn");
    assert_eq!(bjorn.roles, vec!["customer", "employee"]);
    assert!(bjorn.active);
    assert_eq!(bjorn.password_hash.as_deref(), Some("hash-1"));

    let dormant = store
        .find_by_subject("pg-dormant")
        .await?
        .expect("pg-dormant exists");
    assert!(!store.active_status(&dormant));

    assert!(store.find_by_username("pg-ghost").await?.is_none());

    sqlx::query("DELETE FROM users WHERE id IN ('u-pg-1', 'u-pg-2')")
        .execute(&pool)
        .await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres via AUTH_TEST_DATABASE_URL)")]
async fn registers_active_users_and_rejects_duplicates() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();

    sqlx::query("DELETE FROM users WHERE id IN ('u-pg-3', 'u-pg-4')")
        .execute(&pool)
        .await?;
    let store = PgIdentityStore::new(pool.clone());
    let account = |id: &str, username: &str, email: &str| NewIdentity {
        id: id.to_string(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: "hash-3".to_string(),
        first_name: Some("Sigrid".to_string()),
        last_name: None,
        roles: vec!["customer".to_string()],
    };

    store
        .register(account("u-pg-3", "pg-sigrid", "pg-sigrid@example.com"))
        .await?;
    let sigrid = store
        .find_by_username("pg-sigrid")
        .await?
        .expect("pg-sigrid was registered");
    assert!(sigrid.active);
    assert_eq!(sigrid.roles, vec!["customer"]);
    assert_eq!(sigrid.password_hash.as_deref(), Some("hash-3"));

    let taken = store
        .register(account("u-pg-4", "pg-sigrid", "other@example.com"))
        .await;
    assert!(matches!(taken, Err(RegistrationError::UsernameTaken(_))));
    let email = store
        .register(account("u-pg-4", "pg-other", "PG-SIGRID@example.com"))
        .await;
    assert!(matches!(email, Err(RegistrationError::EmailTaken(_))));
    assert!(store.find_by_username("pg-other").await?.is_none());

    sqlx::query("DELETE FROM users WHERE id IN ('u-pg-3', 'u-pg-4')")
        .execute(&pool)
        .await?;
    Ok(())
}
