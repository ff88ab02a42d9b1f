use std::collections::BTreeSet;
use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common_auth::authority_for_role;
use common_http_errors::ApiError;

use crate::identity::Identity;

/// Per-request holder of the resolved identity and its authorities.
///
/// Created by the authentication middleware for every request and dropped
/// with it. An absent identity means the request is anonymous.
#[derive(Debug, Clone, Default)]
pub struct SecurityContext {
    identity: Option<Identity>,
    authorities: BTreeSet<String>,
}

impl SecurityContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(identity: Identity) -> Self {
        let authorities = identity.authorities();
        Self {
            identity: Some(identity),
            authorities,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.subject.as_str())
    }

    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.has_authority(&authority_for_role(role))
    }
}

/// Reads the context installed by the authentication middleware. Requests
/// that never passed through it are anonymous.
#[async_trait]
impl<S> FromRequestParts<S> for SecurityContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<SecurityContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extracts the authenticated identity, rejecting anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SecurityContext>()
            .and_then(SecurityContext::identity)
            .cloned()
            .map(CurrentIdentity)
            .ok_or_else(|| ApiError::unauthorized(parts.uri.path()))
    }
}
