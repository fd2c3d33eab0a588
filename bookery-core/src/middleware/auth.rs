//! Session extractor for handlers that only need an authenticated caller.
//!
//! Tenant-scoped handlers should use [`crate::authz::RequestContext`] instead,
//! which also carries the confirmed tenant boundary.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use crate::auth::Authenticator;
use crate::domain::Principal;
use crate::error::AppError;

/// Authenticated caller recovered from the session cookie or bearer header
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub Principal);

impl<S> FromRequestParts<S> for AuthPrincipal
where
    Authenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Authenticator::from_ref(state);
        let principal = authenticator.authenticate(&parts.headers).await?;
        Ok(AuthPrincipal(principal))
    }
}
