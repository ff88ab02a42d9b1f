use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use axum::body::Body;
use axum::http::{header::AUTHORIZATION, Request};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use coffeedia_auth::credentials::{CredentialVerifier, TrustIdentity};
use coffeedia_auth::{build_router, default_route_policy, AppState};
use common_auth::{JwtConfig, ManualClock};
use common_security::{Identity, InMemoryIdentityStore};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub const TEST_SECRET: &str = "coffeedia-test-secret-0123456789-abcdefghijklmnop";

#[allow(dead_code)]
pub fn start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
}

#[allow(dead_code)]
pub fn seeded_store() -> InMemoryIdentityStore {
    InMemoryIdentityStore::new()
        .with_identity(Identity::new("bjorn", ["customer"], true))
        .with_identity(Identity::new("astrid", ["customer", "employee"], true))
        .with_identity(Identity::new("dormant", ["customer"], false))
}

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryIdentityStore>,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new(routes: Router<AppState>) -> Self {
        Self::with_credentials(routes, Arc::new(TrustIdentity))
    }

    pub fn with_credentials(
        routes: Router<AppState>,
        credentials: Arc<dyn CredentialVerifier>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(seeded_store());
        let state = AppState::new(
            &JwtConfig::new(TEST_SECRET),
            store.clone(),
            credentials,
            clock.clone(),
            default_route_policy("employee"),
            Duration::from_millis(200),
        )
        .expect("app state");
        let router = build_router(
            state.clone(),
            &["http://localhost:3000".to_string()],
            routes,
        );
        Self {
            router,
            state,
            clock,
            store,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router")
    }
}

#[allow(dead_code)]
pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn with_bearer(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

#[allow(dead_code)]
pub async fn text_body(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[allow(dead_code)]
pub struct TestDatabase {
    pool: PgPool,
}

#[allow(dead_code)]
impl TestDatabase {
    pub async fn setup() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("AUTH_TEST_DATABASE_URL") else {
            eprintln!("Skipping Postgres tests: set AUTH_TEST_DATABASE_URL to run them.");
            return Ok(None);
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;
        run_migrations(&pool).await?;
        Ok(Some(Self { pool }))
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }
}

#[allow(dead_code)]
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrations_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let mut entries = std::fs::read_dir(&migrations_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in entries {
        let sql = std::fs::read_to_string(&path)?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                continue;
            }
            sqlx::query(trimmed).execute(pool).await?;
        }
    }

    Ok(())
}
