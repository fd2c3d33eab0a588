//! Tenant (business) domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Tenant identifier, stored as CHAR(36) in MySQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new_v4() -> Self {
        TenantId(Uuid::new_v4())
    }

    pub fn parse_str(s: &str) -> Result<Self, uuid::Error> {
        Ok(TenantId(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for TenantId {
    fn from(uuid: Uuid) -> Self {
        TenantId(uuid)
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for TenantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl sqlx::Type<sqlx::MySql> for TenantId {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::MySql>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for TenantId {
    fn decode(value: sqlx::mysql::MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::MySql>>::decode(value)?;
        Ok(TenantId(Uuid::parse_str(&s)?))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for TenantId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<u8>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::MySql>>::encode_by_ref(&self.0.to_string(), buf)
    }
}

/// Tenant lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    #[default]
    Active,
    Suspended,
}

impl std::str::FromStr for TenantStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            _ => Err(format!("Unknown tenant status: {}", s)),
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantStatus::Active => write!(f, "active"),
            TenantStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl sqlx::Type<sqlx::MySql> for TenantStatus {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::MySql>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for TenantStatus {
    fn decode(value: sqlx::mysql::MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::MySql>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

/// URL-safe tenant slug, also a valid DNS label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantSlug(String);

/// Longest DNS label
const MAX_SLUG_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tenant slug: {0:?}")]
pub struct InvalidSlug(pub String);

impl TenantSlug {
    /// Accepts lowercase `[a-z0-9-]`, no leading or trailing hyphen.
    pub fn parse(value: &str) -> Result<Self, InvalidSlug> {
        let valid = !value.is_empty()
            && value.len() <= MAX_SLUG_LEN
            && !value.starts_with('-')
            && !value.ends_with('-')
            && value
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');

        if valid {
            Ok(TenantSlug(value.to_string()))
        } else {
            Err(InvalidSlug(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantSlug {
    type Error = InvalidSlug;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TenantSlug::parse(&value)
    }
}

impl From<TenantSlug> for String {
    fn from(slug: TenantSlug) -> Self {
        slug.0
    }
}

impl std::fmt::Display for TenantSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tenant entity (a row of the `businesses` table)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_status_parse_and_display() {
        assert_eq!("ACTIVE".parse::<TenantStatus>(), Ok(TenantStatus::Active));
        assert_eq!("suspended".parse::<TenantStatus>(), Ok(TenantStatus::Suspended));
        assert!("deleted".parse::<TenantStatus>().is_err());
        assert_eq!(TenantStatus::Suspended.to_string(), "suspended");
    }

    #[test]
    fn test_tenant_status_serde() {
        let json = serde_json::to_string(&TenantStatus::Active).unwrap();
        assert_eq!(json, "\"active\"");
    }

    #[test]
    fn test_slug_accepts_dns_labels() {
        assert!(TenantSlug::parse("mari-nails").is_ok());
        assert!(TenantSlug::parse("salon42").is_ok());
        assert!(TenantSlug::parse("a").is_ok());
    }

    #[test]
    fn test_slug_rejects_invalid_labels() {
        assert!(TenantSlug::parse("").is_err());
        assert!(TenantSlug::parse("-salon").is_err());
        assert!(TenantSlug::parse("salon-").is_err());
        assert!(TenantSlug::parse("Mari-Nails").is_err());
        assert!(TenantSlug::parse("mari_nails").is_err());
        assert!(TenantSlug::parse(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_slug_deserialize_validates() {
        let ok: Result<TenantSlug, _> = serde_json::from_str("\"mari-nails\"");
        assert_eq!(ok.unwrap().as_str(), "mari-nails");

        let bad: Result<TenantSlug, _> = serde_json::from_str("\"bad slug\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_tenant_id_roundtrip() {
        let raw = "550e8400-e29b-41d4-a716-446655440000";
        let id: TenantId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{}\"", raw));
    }

    #[test]
    fn test_tenant_is_active() {
        let now = Utc::now();
        let mut tenant = Tenant {
            id: TenantId::new_v4(),
            name: "Mari Nails".to_string(),
            slug: "mari-nails".to_string(),
            status: TenantStatus::Active,
            created_at: now,
            updated_at: now,
        };
        assert!(tenant.is_active());

        tenant.status = TenantStatus::Suspended;
        assert!(!tenant.is_active());
    }
}
