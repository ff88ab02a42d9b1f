mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use chrono::Duration as ChronoDuration;
use coffeedia_auth::AppState;
use common_security::CurrentIdentity;
use serde_json::json;
use support::{json_body, post_json, text_body, with_bearer, TestApp};

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/coffees",
            get(|CurrentIdentity(identity): CurrentIdentity| async move {
                format!("menu for {}", identity.subject)
            }),
        )
        .route("/api/admin/coffees", get(|| async { "admin menu" }))
}

async fn access_token(app: &TestApp, username: &str) -> String {
    let response = app
        .send(post_json(
            "/api/auth/login",
            json!({ "username": username, "password": "anypass" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await["accessToken"]
        .as_str()
        .unwrap()
        .to_string()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_endpoints_are_public() {
    let app = TestApp::new(catalog_routes());
    for uri in ["/api/health", "/actuator/health"] {
        let response = app.send(get_request(uri)).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(text_body(response).await, "ok");
    }
}

#[tokio::test]
async fn catalog_routes_require_authentication() {
    let app = TestApp::new(catalog_routes());

    let anonymous = app.send(get_request("/api/coffees")).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(anonymous).await;
    assert_eq!(body["code"], "unauthorized");
    assert_eq!(body["path"], "/api/coffees");

    let token = access_token(&app, "bjorn").await;
    let response = app.send(with_bearer("GET", "/api/coffees", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "menu for bjorn");
}

#[tokio::test]
async fn admin_routes_distinguish_403_from_401() {
    let app = TestApp::new(catalog_routes());

    let anonymous = app.send(get_request("/api/admin/coffees")).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let customer = access_token(&app, "bjorn").await;
    let forbidden = app
        .send(with_bearer("GET", "/api/admin/coffees", &customer))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    let body = json_body(forbidden).await;
    assert_eq!(body["missing_role"], "employee");
    assert_eq!(
        body["message"],
        "You do not have permission to access this resource."
    );

    let employee = access_token(&app, "astrid").await;
    let allowed = app
        .send(with_bearer("GET", "/api/admin/coffees", &employee))
        .await;
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(text_body(allowed).await, "admin menu");
}

#[tokio::test]
async fn deactivated_identity_loses_access_immediately() {
    let app = TestApp::new(catalog_routes());
    let token = access_token(&app, "bjorn").await;

    app.store
        .insert(common_security::Identity::new("bjorn", ["customer"], false));
    let response = app.send(with_bearer("GET", "/api/coffees", &token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_access_token_is_anonymous() {
    let app = TestApp::new(catalog_routes());
    let token = access_token(&app, "bjorn").await;

    app.clock.advance(ChronoDuration::hours(1) - ChronoDuration::milliseconds(1));
    let still_valid = app.send(with_bearer("GET", "/api/coffees", &token)).await;
    assert_eq!(still_valid.status(), StatusCode::OK);

    app.clock.advance(ChronoDuration::milliseconds(1));
    let expired = app.send(with_bearer("GET", "/api/coffees", &token)).await;
    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn prometheus_endpoint_exposes_auth_and_error_counters() {
    let app = TestApp::new(catalog_routes());
    access_token(&app, "bjorn").await;
    let _ = app
        .send(post_json(
            "/api/auth/login",
            json!({ "username": "ghost", "password": "anypass" }),
        ))
        .await;
    let _ = app.send(get_request("/api/coffees")).await;

    let response = app.send(get_request("/actuator/prometheus")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = text_body(response).await;
    assert!(text.contains("auth_login_attempts_total"));
    assert!(text.contains("outcome=\"success\""));
    assert!(text.contains("outcome=\"user_not_found\""));
    assert!(text.contains("http_errors_total"));
    assert!(text.contains("service=\"coffeedia-auth\""));
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let app = TestApp::new(catalog_routes());
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/auth/login")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "http://localhost:3000"
    );
}
