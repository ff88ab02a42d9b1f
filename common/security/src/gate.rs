use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::warn;

use crate::context::SecurityContext;
use crate::middleware::{authenticate, Authenticator};
use crate::policy::RoutePolicy;

/// Allows the request through or ends it with 401/403 per the route policy.
pub async fn authorize(
    State(policy): State<Arc<RoutePolicy>>,
    req: Request,
    next: Next,
) -> Response {
    let decision = {
        let anonymous = SecurityContext::anonymous();
        let ctx = req.extensions().get::<SecurityContext>().unwrap_or(&anonymous);
        policy.evaluate(ctx, req.uri().path())
    };

    match decision {
        Ok(()) => next.run(req).await,
        Err(denial) => {
            warn!(
                method = %req.method(),
                path = %denial.path(),
                status = denial.status().as_u16(),
                reason = %denial,
                "request denied"
            );
            denial.into_response()
        }
    }
}

/// Wraps `router` so every request is authenticated and then authorized.
pub fn protect<S>(router: Router<S>, authenticator: Authenticator) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let policy = authenticator.policy().clone();
    router
        .layer(from_fn_with_state(policy, authorize))
        .layer(from_fn_with_state(authenticator, authenticate))
}
