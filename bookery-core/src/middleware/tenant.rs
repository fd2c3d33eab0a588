//! Tenant resolution middleware
//!
//! Runs before routing so every handler and guard sees the same
//! [`TenantResolution`] in the request extensions.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use metrics::counter;

use crate::tenancy::{TenantResolution, TenantResolver, TENANT_SLUG_HEADER};

pub async fn resolve_tenant(
    State(resolver): State<Arc<TenantResolver>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Only this middleware may set the slug header
    request.headers_mut().remove(TENANT_SLUG_HEADER);

    if resolver.is_bypassed(request.uri().path()) {
        return next.run(request).await;
    }

    let resolution = resolver.resolve_request(request.headers(), request.uri());
    match &resolution {
        TenantResolution::Tenant(slug) => {
            if let Ok(value) = HeaderValue::from_str(slug.as_str()) {
                request.headers_mut().insert(TENANT_SLUG_HEADER, value);
            }
            counter!("bookery_tenant_resolutions_total", "result" => "tenant").increment(1);
        }
        TenantResolution::NoTenant => {
            counter!("bookery_tenant_resolutions_total", "result" => "no_tenant").increment(1);
        }
    }

    request.extensions_mut().insert(resolution);
    next.run(request).await
}
