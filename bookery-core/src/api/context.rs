//! Guarded context endpoints, one per route group
//!
//! Each handler reports the boundary the access guard established, so the
//! scoping rules can be checked end to end from outside the service.

use axum::{extract::Query, Json};
use serde::{Deserialize, Serialize};

use crate::authz::{RequestContext, RouteScope, TenantScope};
use crate::domain::{Principal, Role, TenantId};
use crate::error::Result;

/// Business back office: owners, staff and platform admins of the host tenant
pub const BUSINESS_SCOPE: RouteScope =
    RouteScope::tenant(&[Role::BusinessOwner, Role::Staff, Role::SystemAdmin]);

/// Customer portal of the host tenant
pub const CUSTOMER_SCOPE: RouteScope =
    RouteScope::tenant(&[Role::Customer, Role::Staff, Role::BusinessOwner]);

/// Platform administration, not bound to any tenant
pub const ADMIN_SCOPE: RouteScope = RouteScope::global(&[Role::SystemAdmin]);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextQuery {
    pub business_id: Option<TenantId>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextResponse {
    /// Tenant every query of this request is filtered by
    pub tenant_id: TenantId,
    pub role: Role,
    pub subject_id: String,
}

fn describe(context: &RequestContext, tenant_id: TenantId) -> ContextResponse {
    ContextResponse {
        tenant_id,
        role: context.principal.role,
        subject_id: context.principal.subject_id.clone(),
    }
}

/// GET /api/business/context
pub async fn business_context(
    context: RequestContext,
    Query(query): Query<ContextQuery>,
) -> Result<Json<ContextResponse>> {
    let tenant_id = context.tenant_filter(query.business_id)?;
    Ok(Json(describe(&context, tenant_id)))
}

/// GET /api/customer/context
pub async fn customer_context(
    context: RequestContext,
    Query(query): Query<ContextQuery>,
) -> Result<Json<ContextResponse>> {
    let tenant_id = context.tenant_filter(query.business_id)?;
    Ok(Json(describe(&context, tenant_id)))
}

#[derive(Debug, Serialize)]
pub struct AdminContextResponse {
    pub scope: TenantScope,
    pub principal: Principal,
}

/// GET /api/admin/context
pub async fn admin_context(context: RequestContext) -> Json<AdminContextResponse> {
    Json(AdminContextResponse {
        scope: context.scope,
        principal: context.principal,
    })
}
