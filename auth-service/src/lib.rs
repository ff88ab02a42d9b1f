pub mod app;
pub mod config;
pub mod credentials;
pub mod handlers;
pub mod identity_store;
pub mod metrics;
pub mod service;

pub use app::{build_router, default_route_policy, AppState};
pub use service::{AuthenticationService, SignUpRequest, SignUpResponse, TokenBundle};
