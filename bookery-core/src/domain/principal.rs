//! Authenticated principal and its roles

use serde::{Deserialize, Serialize};

use super::tenant::{TenantId, TenantSlug};

/// Actor class carried in every session token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SystemAdmin,
    BusinessOwner,
    Staff,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "SYSTEM_ADMIN",
            Role::BusinessOwner => "BUSINESS_OWNER",
            Role::Staff => "STAFF",
            Role::Customer => "CUSTOMER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "SYSTEM_ADMIN" => Ok(Role::SystemAdmin),
            "BUSINESS_OWNER" => Ok(Role::BusinessOwner),
            "STAFF" => Ok(Role::Staff),
            "CUSTOMER" => Ok(Role::Customer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Sub-role of a STAFF member inside their business
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaffRole {
    /// Manages the business alongside the owner
    Admin,
    /// Limited to their own schedule
    Staff,
}

impl std::str::FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Ok(StaffRole::Admin),
            "STAFF" => Ok(StaffRole::Staff),
            _ => Err(format!("Unknown staff role: {}", s)),
        }
    }
}

/// The business a principal belongs to, as embedded in its token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRef {
    pub id: TenantId,
    pub name: Option<String>,
    pub slug: TenantSlug,
}

/// Identity recovered from a verified session token.
///
/// Rebuilt on every request and never persisted. `tenant` is `None` exactly
/// when `role` is [`Role::SystemAdmin`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject_id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub tenant: Option<TenantRef>,
    pub staff_role: Option<StaffRole>,
    pub is_admin: bool,
}

impl Principal {
    pub fn is_system_admin(&self) -> bool {
        self.role == Role::SystemAdmin
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant.as_ref().map(|t| t.id)
    }

    pub fn tenant_slug(&self) -> Option<&TenantSlug> {
        self.tenant.as_ref().map(|t| &t.slug)
    }

    /// Whether the token was issued for the tenant behind `slug`
    pub fn belongs_to(&self, slug: &TenantSlug) -> bool {
        self.tenant_slug() == Some(slug)
    }
}
