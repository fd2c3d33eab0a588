//! Route authorization and tenant scoping
//!
//! [`authorize`] is a pure decision over the principal, the route's
//! [`RouteScope`] and the host's [`TenantResolution`]. Token tenant fields
//! are only an identity cache, so an allowed request is then confirmed
//! against the live tenant record by [`confirm_tenant`] before the handler
//! sees a [`RequestContext`].

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use thiserror::Error;

use crate::domain::{Principal, Role, TenantId, TenantSlug};
use crate::error::AppError;
use crate::repository::TenantRepository;
use crate::tenancy::TenantResolution;

/// Access requirements of a route group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteScope {
    /// Accepted roles
    pub roles: &'static [Role],
    /// Whether the route serves the tenant named by the host
    pub tenant_scoped: bool,
    /// Whether the principal must also carry the `isAdmin` flag
    pub require_admin_flag: bool,
}

impl RouteScope {
    pub const fn tenant(roles: &'static [Role]) -> Self {
        Self {
            roles,
            tenant_scoped: true,
            require_admin_flag: false,
        }
    }

    pub const fn global(roles: &'static [Role]) -> Self {
        Self {
            roles,
            tenant_scoped: false,
            require_admin_flag: false,
        }
    }

    pub const fn with_admin_flag(mut self) -> Self {
        self.require_admin_flag = true;
        self
    }

    pub fn accepts(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("no authenticated principal")]
    Unauthenticated,
    #[error("principal may not access this route")]
    Forbidden,
    #[error("tenant not found")]
    TenantNotFound,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::Forbidden => "forbidden",
            DenyReason::TenantNotFound => "tenant_not_found",
        }
    }
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => AppError::Unauthenticated(reason.to_string()),
            DenyReason::Forbidden => AppError::Forbidden(reason.to_string()),
            DenyReason::TenantNotFound => AppError::TenantNotFound(reason.to_string()),
        }
    }
}

/// What an allowed request may touch, before the live tenant check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantedScope {
    /// The tenant named by the request host
    ResolvedTenant(TenantSlug),
    /// The principal's own tenant (routes not bound to a host tenant)
    OwnTenant(TenantId),
    /// Every tenant (system administrators only)
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(GrantedScope),
    Deny(DenyReason),
}

fn has_admin_flag(principal: &Principal) -> bool {
    principal.is_admin || principal.is_system_admin()
}

pub fn authorize(
    principal: Option<&Principal>,
    scope: &RouteScope,
    resolution: &TenantResolution,
) -> Decision {
    let Some(principal) = principal else {
        return Decision::Deny(DenyReason::Unauthenticated);
    };

    if scope.tenant_scoped {
        let Some(slug) = resolution.slug() else {
            return Decision::Deny(DenyReason::TenantNotFound);
        };
        if !principal.is_system_admin() && !principal.belongs_to(slug) {
            return Decision::Deny(DenyReason::Forbidden);
        }
    }

    if !scope.accepts(principal.role) {
        return Decision::Deny(DenyReason::Forbidden);
    }
    if scope.require_admin_flag && !has_admin_flag(principal) {
        return Decision::Deny(DenyReason::Forbidden);
    }

    match (scope.tenant_scoped, resolution.slug()) {
        (true, Some(slug)) => Decision::Allow(GrantedScope::ResolvedTenant(slug.clone())),
        _ if principal.is_system_admin() => Decision::Allow(GrantedScope::Global),
        _ => match principal.tenant_id() {
            Some(id) => Decision::Allow(GrantedScope::OwnTenant(id)),
            None => Decision::Deny(DenyReason::Forbidden),
        },
    }
}

/// Tenant boundary of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TenantScope {
    Tenant { id: TenantId, slug: TenantSlug },
    Global,
}

/// Check an allowed grant against the live tenant record.
///
/// Unknown and suspended tenants look identical to non-admin callers.
/// System administrators may enter suspended tenants.
pub async fn confirm_tenant(
    tenants: &dyn TenantRepository,
    principal: &Principal,
    granted: GrantedScope,
) -> Result<TenantScope, AppError> {
    match granted {
        GrantedScope::Global => Ok(TenantScope::Global),
        GrantedScope::ResolvedTenant(slug) => {
            let tenant = tenants
                .find_by_slug(slug.as_str())
                .await?
                .ok_or_else(|| AppError::TenantNotFound(format!("no tenant '{}'", slug)))?;

            if !principal.is_system_admin() {
                if !tenant.is_active() {
                    return Err(AppError::TenantNotFound(format!(
                        "tenant '{}' is {}",
                        slug, tenant.status
                    )));
                }
                if principal.tenant_id() != Some(tenant.id) {
                    return Err(AppError::Forbidden(format!(
                        "token business id does not match tenant '{}'",
                        slug
                    )));
                }
            }

            Ok(TenantScope::Tenant {
                id: tenant.id,
                slug,
            })
        }
        GrantedScope::OwnTenant(id) => {
            let tenant = tenants
                .find_by_id(id)
                .await?
                .filter(|t| t.is_active())
                .ok_or_else(|| AppError::TenantNotFound(format!("tenant {} unavailable", id)))?;

            let slug = TenantSlug::parse(&tenant.slug)
                .ok()
                .or_else(|| principal.tenant_slug().cloned())
                .ok_or_else(|| AppError::TenantNotFound(format!("tenant {} has no slug", id)))?;

            Ok(TenantScope::Tenant { id: tenant.id, slug })
        }
    }
}

/// Verified principal and tenant boundary, attached to every guarded request.
///
/// Handlers must build their queries from [`RequestContext::tenant_filter`];
/// tenant ids supplied in a body or query string are never authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub scope: TenantScope,
    pub principal: Principal,
}

impl RequestContext {
    pub fn tenant_id(&self) -> Option<TenantId> {
        match &self.scope {
            TenantScope::Tenant { id, .. } => Some(*id),
            TenantScope::Global => None,
        }
    }

    /// Tenant id to filter a query by.
    ///
    /// Tenant-bound callers always get their own tenant; naming another one is
    /// forbidden. Global callers must name the tenant they want.
    pub fn tenant_filter(&self, requested: Option<TenantId>) -> Result<TenantId, AppError> {
        match &self.scope {
            TenantScope::Tenant { id, .. } => match requested {
                Some(other) if other != *id => Err(AppError::Forbidden(format!(
                    "tenant {} requested from tenant {}",
                    other, id
                ))),
                _ => Ok(*id),
            },
            TenantScope::Global => requested
                .ok_or_else(|| AppError::BadRequest("tenant id is required".to_string())),
        }
    }

    /// Hide rows of other tenants as not found
    pub fn ensure_owned(&self, row_tenant_id: TenantId) -> Result<(), AppError> {
        match &self.scope {
            TenantScope::Tenant { id, .. } if *id != row_tenant_id => {
                Err(AppError::NotFound("resource not found".to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated("route is not guarded".to_string()))
    }
}
