use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use common_auth::{bearer_token, AuthError, TokenValidator};
use futures_util::FutureExt;
use tracing::{debug, error, warn};

use crate::context::SecurityContext;
use crate::identity::{find_subject_within, IdentityLookup};
use crate::policy::RoutePolicy;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(2000);

/// Turns a bearer credential into a [`SecurityContext`].
///
/// Resolution never fails: a missing or malformed header, an invalid or
/// refresh-typed token, an unknown or inactive subject, a failing or slow
/// lookup, or a panic inside the lookup all leave the context anonymous.
#[derive(Clone)]
pub struct Authenticator {
    validator: Arc<TokenValidator>,
    identities: Arc<dyn IdentityLookup>,
    policy: Arc<RoutePolicy>,
    lookup_timeout: Duration,
}

impl Authenticator {
    pub fn new(
        validator: Arc<TokenValidator>,
        identities: Arc<dyn IdentityLookup>,
        policy: Arc<RoutePolicy>,
    ) -> Self {
        Self {
            validator,
            identities,
            policy,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &Arc<RoutePolicy> {
        &self.policy
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> SecurityContext {
        let token = match bearer_token(headers) {
            Ok(token) => token,
            Err(AuthError::MissingAuthorization) => return SecurityContext::anonymous(),
            Err(err) => {
                debug!(reason = %err, "ignoring authorization header");
                return SecurityContext::anonymous();
            }
        };

        let Some(claims) = self.validator.access_claims(&token) else {
            warn!(reason = "invalid_token", "bearer token rejected");
            return SecurityContext::anonymous();
        };

        let lookup = find_subject_within(
            self.identities.as_ref(),
            &claims.subject,
            self.lookup_timeout,
        );
        let identity = match AssertUnwindSafe(lookup).catch_unwind().await {
            Ok(Ok(Some(identity))) => identity,
            Ok(Ok(None)) => {
                warn!(subject = %claims.subject, reason = "unknown_subject", "bearer token rejected");
                return SecurityContext::anonymous();
            }
            Ok(Err(err)) => {
                warn!(subject = %claims.subject, reason = %err, "identity lookup failed");
                return SecurityContext::anonymous();
            }
            Err(_) => {
                error!(subject = %claims.subject, "identity lookup panicked");
                return SecurityContext::anonymous();
            }
        };

        if !self.identities.active_status(&identity) {
            warn!(subject = %identity.subject, reason = "inactive", "bearer token rejected");
            return SecurityContext::anonymous();
        }

        debug!(subject = %identity.subject, "bearer token accepted");
        SecurityContext::authenticated(identity)
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("validator", &self.validator)
            .field("policy", &self.policy)
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

/// Populates the request's [`SecurityContext`]; never rejects. Public paths
/// skip token processing and stay anonymous.
pub async fn authenticate(
    State(authenticator): State<Authenticator>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = if authenticator.policy.is_public(req.uri().path()) {
        SecurityContext::anonymous()
    } else {
        authenticator.resolve(req.headers()).await
    };
    req.extensions_mut().insert(ctx);
    next.run(req).await
}
