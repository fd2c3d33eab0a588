//! Session token encoding and verification

use crate::config::JwtConfig;
use crate::domain::{Principal, Role, StaffRole, TenantId, TenantRef, TenantSlug};
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session token claims.
///
/// Field names follow the wire format shared with the web front end
/// (`businessId`, `staffRole`, `isAdmin`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// Subject (user ID)
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_role: Option<StaffRole>,
    #[serde(default)]
    pub is_admin: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Why a token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token has expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for DecodeError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => DecodeError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                DecodeError::SignatureInvalid
            }
            _ => DecodeError::Malformed,
        }
    }
}

impl SessionClaims {
    pub fn from_principal(principal: &Principal, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        let tenant = principal.tenant.as_ref();
        Self {
            id: principal.subject_id.clone(),
            email: principal.email.clone(),
            name: principal.name.clone(),
            role: principal.role,
            business_id: tenant.map(|t| t.id.to_string()),
            business_name: tenant.and_then(|t| t.name.clone()),
            business_slug: tenant.map(|t| t.slug.to_string()),
            staff_role: principal.staff_role,
            is_admin: principal.is_admin,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }

    /// Rebuild the principal. Every role except `SYSTEM_ADMIN` must name its
    /// business by id and slug; admin business fields are ignored.
    pub fn principal(&self) -> std::result::Result<Principal, DecodeError> {
        let tenant = match self.role {
            Role::SystemAdmin => None,
            _ => {
                let id = self
                    .business_id
                    .as_deref()
                    .and_then(|id| TenantId::parse_str(id).ok())
                    .ok_or(DecodeError::Malformed)?;
                let slug = self
                    .business_slug
                    .as_deref()
                    .and_then(|slug| TenantSlug::parse(slug).ok())
                    .ok_or(DecodeError::Malformed)?;
                Some(TenantRef {
                    id,
                    name: self.business_name.clone(),
                    slug,
                })
            }
        };

        Ok(Principal {
            subject_id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            tenant,
            staff_role: match self.role {
                Role::Staff => self.staff_role,
                _ => None,
            },
            is_admin: self.is_admin,
        })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// HS256 session token codec
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl: Duration::seconds(config.ttl_secs),
        }
    }

    /// Configured session lifetime
    pub fn session_ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `principal` valid for `ttl` from now
    pub fn encode(&self, principal: &Principal, ttl: Duration) -> Result<String> {
        self.encode_at(principal, Utc::now(), ttl)
    }

    pub fn encode_at(
        &self,
        principal: &Principal,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String> {
        let claims = SessionClaims::from_principal(principal, issued_at, ttl);
        self.encode_claims(&claims)
    }

    pub fn encode_claims(&self, claims: &SessionClaims) -> Result<String> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, claims, &self.encoding_key).map_err(|e| AppError::Internal(e.into()))
    }

    /// Verify signature, then expiry, then claim consistency.
    pub fn decode(&self, token: &str) -> std::result::Result<SessionClaims, DecodeError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;

        // jsonwebtoken accepts now == exp, a session ends at exp
        if Utc::now().timestamp() >= claims.exp {
            return Err(DecodeError::Expired);
        }
        claims.principal()?;

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-for-testing-purposes-only".to_string(),
            ttl_secs: 604_800,
        }
    }

    fn staff() -> Principal {
        Principal {
            subject_id: "usr_42".to_string(),
            email: "ana@mari-nails.test".to_string(),
            name: Some("Ana".to_string()),
            role: Role::Staff,
            tenant: Some(TenantRef {
                id: TenantId::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
                name: Some("Mari Nails".to_string()),
                slug: TenantSlug::parse("mari-nails").unwrap(),
            }),
            staff_role: Some(StaffRole::Admin),
            is_admin: true,
        }
    }

    fn admin() -> Principal {
        Principal {
            subject_id: "adm_1".to_string(),
            email: "root@bookery.test".to_string(),
            name: None,
            role: Role::SystemAdmin,
            tenant: None,
            staff_role: None,
            is_admin: true,
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let codec = TokenCodec::new(&test_config());
        let token = codec.encode(&staff(), codec.session_ttl()).unwrap();

        let claims = codec.decode(&token).unwrap();
        assert_eq!(claims.principal().unwrap(), staff());
        assert_eq!(claims.exp - claims.iat, 604_800);
    }

    #[test]
    fn test_claims_roundtrip_identical() {
        let codec = TokenCodec::new(&test_config());
        let claims = SessionClaims::from_principal(&staff(), Utc::now(), Duration::hours(1));
        let token = codec.encode_claims(&claims).unwrap();

        assert_eq!(codec.decode(&token).unwrap(), claims);
    }

    #[test]
    fn test_wire_field_names() {
        let claims = SessionClaims::from_principal(&staff(), Utc::now(), Duration::hours(1));
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["role"], "STAFF");
        assert_eq!(json["businessSlug"], "mari-nails");
        assert_eq!(json["businessId"], "550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(json["staffRole"], "ADMIN");
        assert_eq!(json["isAdmin"], true);
        assert!(json.get("business_slug").is_none());
    }

    #[test]
    fn test_admin_token_has_no_business() {
        let codec = TokenCodec::new(&test_config());
        let token = codec.encode(&admin(), Duration::hours(1)).unwrap();

        let claims = codec.decode(&token).unwrap();
        assert!(claims.business_id.is_none());
        assert!(claims.principal().unwrap().tenant.is_none());
    }

    #[test]
    fn test_admin_business_fields_ignored() {
        let codec = TokenCodec::new(&test_config());
        let mut claims = SessionClaims::from_principal(&admin(), Utc::now(), Duration::hours(1));
        claims.business_slug = Some("Not A Slug".to_string());
        let token = codec.encode_claims(&claims).unwrap();

        let principal = codec.decode(&token).unwrap().principal().unwrap();
        assert!(principal.tenant.is_none());
    }

    #[test]
    fn test_expired_token() {
        let codec = TokenCodec::new(&test_config());
        let issued = Utc::now() - Duration::hours(2);
        let token = codec.encode_at(&staff(), issued, Duration::hours(1)).unwrap();

        assert_eq!(codec.decode(&token), Err(DecodeError::Expired));
    }

    #[test]
    fn test_expired_one_second_after_exp() {
        let codec = TokenCodec::new(&test_config());
        let issued = Utc::now() - Duration::seconds(61);
        let token = codec.encode_at(&staff(), issued, Duration::seconds(60)).unwrap();

        assert_eq!(codec.decode(&token), Err(DecodeError::Expired));
    }

    #[test]
    fn test_valid_just_before_exp() {
        let codec = TokenCodec::new(&test_config());
        let issued = Utc::now() - Duration::seconds(50);
        let token = codec.encode_at(&staff(), issued, Duration::seconds(60)).unwrap();

        assert!(codec.decode(&token).is_ok());
    }

    #[test]
    fn test_wrong_secret() {
        let codec = TokenCodec::new(&test_config());
        let other = TokenCodec::new(&JwtConfig {
            secret: "another-secret-key-that-is-long-enough".to_string(),
            ..test_config()
        });
        let token = other.encode(&staff(), Duration::hours(1)).unwrap();

        assert_eq!(codec.decode(&token), Err(DecodeError::SignatureInvalid));
    }

    #[test]
    fn test_mutated_signature() {
        let codec = TokenCodec::new(&test_config());
        let token = codec.encode(&staff(), Duration::hours(1)).unwrap();

        let (signed, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let tampered = format!("{}.{}", signed, chars.into_iter().collect::<String>());

        assert_eq!(codec.decode(&tampered), Err(DecodeError::SignatureInvalid));
    }

    #[test]
    fn test_mutated_payload() {
        let codec = TokenCodec::new(&test_config());
        let token = codec.encode(&staff(), Duration::hours(1)).unwrap();
        let other = codec.encode(&admin(), Duration::hours(1)).unwrap();

        // Admin payload under the staff signature
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let spliced = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(codec.decode(&spliced), Err(DecodeError::SignatureInvalid));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = TokenCodec::new(&test_config());
        assert_eq!(codec.decode("invalid-token"), Err(DecodeError::Malformed));
        assert_eq!(codec.decode(""), Err(DecodeError::Malformed));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let codec = TokenCodec::new(&test_config());
        let claims = SessionClaims::from_principal(&staff(), Utc::now(), Duration::hours(1));
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(test_config().secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec.decode(&token), Err(DecodeError::SignatureInvalid));
    }

    #[test]
    fn test_non_admin_without_business_is_malformed() {
        let codec = TokenCodec::new(&test_config());
        let mut claims = SessionClaims::from_principal(&staff(), Utc::now(), Duration::hours(1));
        claims.business_id = None;
        let token = codec.encode_claims(&claims).unwrap();

        assert_eq!(codec.decode(&token), Err(DecodeError::Malformed));
    }

    #[test]
    fn test_invalid_business_slug_is_malformed() {
        let codec = TokenCodec::new(&test_config());
        let mut claims = SessionClaims::from_principal(&staff(), Utc::now(), Duration::hours(1));
        claims.business_slug = Some("Mari Nails".to_string());
        let token = codec.encode_claims(&claims).unwrap();

        assert_eq!(codec.decode(&token), Err(DecodeError::Malformed));
    }

    #[test]
    fn test_unknown_role_is_malformed() {
        let codec = TokenCodec::new(&test_config());
        let claims = serde_json::json!({
            "id": "usr_1",
            "email": "x@test",
            "role": "OWNER",
            "iat": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + 3600,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(test_config().secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec.decode(&token), Err(DecodeError::Malformed));
    }

    #[test]
    fn test_staff_role_dropped_for_non_staff() {
        let mut owner = staff();
        owner.role = Role::BusinessOwner;
        let claims = SessionClaims::from_principal(&owner, Utc::now(), Duration::hours(1));

        assert_eq!(claims.principal().unwrap().staff_role, None);
    }

    #[test]
    fn test_expires_at() {
        let issued = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let claims = SessionClaims::from_principal(&staff(), issued, Duration::seconds(60));
        assert_eq!(
            claims.expires_at(),
            DateTime::from_timestamp(1_700_000_060, 0)
        );
    }

    #[test]
    fn test_codec_clone() {
        let codec = TokenCodec::new(&test_config());
        let cloned = codec.clone();
        let token = codec.encode(&staff(), Duration::hours(1)).unwrap();
        assert!(cloned.decode(&token).is_ok());
    }
}
