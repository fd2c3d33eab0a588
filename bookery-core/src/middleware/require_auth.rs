//! Access enforcement middleware for guarded route groups
//!
//! Authenticates the caller, applies the group's [`RouteScope`] against the
//! host's tenant and confirms the live tenant record. On success the
//! [`RequestContext`] is attached for handlers; every rejection is an
//! [`AppError`] rendered in the standard error body.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;

use crate::auth::{AuthFailure, Authenticator};
use crate::authz::{self, Decision, RequestContext, RouteScope};
use crate::error::AppError;
use crate::repository::TenantRepository;
use crate::tenancy::TenantResolution;

/// Shared state for the access middleware of one route group
#[derive(Clone)]
pub struct AccessGuard {
    authenticator: Authenticator,
    tenants: Arc<dyn TenantRepository>,
    scope: RouteScope,
}

impl AccessGuard {
    pub fn new(
        authenticator: Authenticator,
        tenants: Arc<dyn TenantRepository>,
        scope: RouteScope,
    ) -> Self {
        Self {
            authenticator,
            tenants,
            scope,
        }
    }

    pub async fn check(
        &self,
        headers: &axum::http::HeaderMap,
        resolution: &TenantResolution,
    ) -> Result<RequestContext, AppError> {
        let principal = match self.authenticator.authenticate(headers).await {
            Ok(principal) => Some(principal),
            Err(AuthFailure::MissingToken) => None,
            Err(failure) => return Err(failure.into()),
        };

        let granted = match authz::authorize(principal.as_ref(), &self.scope, resolution) {
            Decision::Allow(granted) => granted,
            Decision::Deny(reason) => {
                counter!("bookery_authz_decisions_total", "result" => reason.as_str())
                    .increment(1);
                tracing::debug!(
                    reason = reason.as_str(),
                    tenant = ?resolution.slug().map(|s| s.as_str()),
                    "Access denied"
                );
                return Err(reason.into());
            }
        };

        // authorize() only allows a present principal
        let principal = principal
            .ok_or_else(|| AppError::Unauthenticated("no principal".to_string()))?;

        let scope = match authz::confirm_tenant(self.tenants.as_ref(), &principal, granted).await
        {
            Ok(scope) => scope,
            Err(e) => {
                counter!("bookery_authz_decisions_total", "result" => e.code().to_lowercase())
                    .increment(1);
                return Err(e);
            }
        };

        counter!("bookery_authz_decisions_total", "result" => "allow").increment(1);
        Ok(RequestContext { scope, principal })
    }
}

pub async fn require_access(
    State(guard): State<AccessGuard>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let resolution = request
        .extensions()
        .get::<TenantResolution>()
        .cloned()
        .unwrap_or(TenantResolution::NoTenant);

    match guard.check(request.headers(), &resolution).await {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
