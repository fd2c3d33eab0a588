//! Request authentication
//!
//! Locates the session token a request carries, verifies it and recovers the
//! [`Principal`]. Each cookie name is a distinct [`SessionChannel`] that only
//! accepts the roles issued on it, so an admin session can never be replayed
//! through the customer cookie and vice versa.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use metrics::counter;
use thiserror::Error;

use crate::domain::{Principal, Role};
use crate::error::AppError;
use crate::jwt::{DecodeError, SessionClaims, TokenCodec};
use crate::revocation::RevocationStore;

pub const ADMIN_COOKIE: &str = "admin-auth-token";
pub const BUSINESS_COOKIE: &str = "business-auth-token";
pub const MEMBER_COOKIE: &str = "auth-token";

/// Where a session token was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChannel {
    /// `admin-auth-token` cookie
    Admin,
    /// `business-auth-token` cookie
    Business,
    /// `auth-token` cookie (customers and staff on the booking site)
    Member,
    /// `Authorization: Bearer` header
    Bearer,
}

impl SessionChannel {
    /// Cookie channels in lookup order
    pub const COOKIES: [SessionChannel; 3] = [
        SessionChannel::Admin,
        SessionChannel::Business,
        SessionChannel::Member,
    ];

    pub fn cookie_name(&self) -> Option<&'static str> {
        match self {
            SessionChannel::Admin => Some(ADMIN_COOKIE),
            SessionChannel::Business => Some(BUSINESS_COOKIE),
            SessionChannel::Member => Some(MEMBER_COOKIE),
            SessionChannel::Bearer => None,
        }
    }

    pub fn accepts(&self, role: Role) -> bool {
        match self {
            SessionChannel::Admin => role == Role::SystemAdmin,
            SessionChannel::Business => matches!(role, Role::BusinessOwner | Role::Staff),
            SessionChannel::Member => matches!(role, Role::Staff | Role::Customer),
            SessionChannel::Bearer => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionChannel::Admin => "admin",
            SessionChannel::Business => "business",
            SessionChannel::Member => "member",
            SessionChannel::Bearer => "bearer",
        }
    }
}

/// A token together with the channel it arrived on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCarrier {
    pub channel: SessionChannel,
    pub token: String,
}

/// Find the first non-empty session token: admin, business and member
/// cookies, then the bearer header.
pub fn extract_session_carrier(headers: &HeaderMap) -> Option<SessionCarrier> {
    let jar = CookieJar::from_headers(headers);
    for channel in SessionChannel::COOKIES {
        let token = channel
            .cookie_name()
            .and_then(|name| jar.get(name))
            .map(|cookie| cookie.value().trim())
            .filter(|value| !value.is_empty());
        if let Some(token) = token {
            return Some(SessionCarrier {
                channel,
                token: token.to_string(),
            });
        }
    }

    extract_bearer_token(headers).map(|token| SessionCarrier {
        channel: SessionChannel::Bearer,
        token: token.to_string(),
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Why a request could not be authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("no session token presented")]
    MissingToken,
    #[error("session token is malformed")]
    Malformed,
    #[error("session token signature is invalid")]
    SignatureInvalid,
    #[error("session token has expired")]
    Expired,
    #[error("session token was revoked")]
    Revoked,
    #[error("session token role is not accepted on this channel")]
    ChannelMismatch,
    #[error("revocation store unavailable")]
    StoreUnavailable,
}

impl AuthFailure {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "missing_token",
            AuthFailure::Malformed => "malformed",
            AuthFailure::SignatureInvalid => "signature_invalid",
            AuthFailure::Expired => "expired",
            AuthFailure::Revoked => "revoked",
            AuthFailure::ChannelMismatch => "channel_mismatch",
            AuthFailure::StoreUnavailable => "store_unavailable",
        }
    }
}

impl From<DecodeError> for AuthFailure {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Malformed => AuthFailure::Malformed,
            DecodeError::SignatureInvalid => AuthFailure::SignatureInvalid,
            DecodeError::Expired => AuthFailure::Expired,
        }
    }
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Malformed => AppError::MalformedToken(failure.to_string()),
            AuthFailure::StoreUnavailable => AppError::Unavailable(failure.to_string()),
            other => AppError::Unauthenticated(other.to_string()),
        }
    }
}

/// A verified session
#[derive(Debug, Clone)]
pub struct Session {
    pub carrier: SessionCarrier,
    pub claims: SessionClaims,
    pub principal: Principal,
}

#[derive(Clone)]
pub struct Authenticator {
    codec: TokenCodec,
    revocations: Arc<dyn RevocationStore>,
}

impl Authenticator {
    pub fn new(codec: TokenCodec, revocations: Arc<dyn RevocationStore>) -> Self {
        Self { codec, revocations }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn revocations(&self) -> &Arc<dyn RevocationStore> {
        &self.revocations
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthFailure> {
        self.authenticate_session(headers)
            .await
            .map(|session| session.principal)
    }

    /// Like [`Self::authenticate`] but keeps the carrier and raw claims,
    /// which logout needs.
    pub async fn authenticate_session(&self, headers: &HeaderMap) -> Result<Session, AuthFailure> {
        let result = match extract_session_carrier(headers) {
            Some(carrier) => self.verify(carrier).await,
            None => Err(AuthFailure::MissingToken),
        };

        match &result {
            Ok(session) => {
                counter!("bookery_auth_authentications_total", "result" => "success")
                    .increment(1);
                tracing::debug!(
                    subject = %session.principal.subject_id,
                    role = %session.principal.role,
                    channel = session.carrier.channel.as_str(),
                    "Authenticated request"
                );
            }
            Err(failure) => {
                counter!("bookery_auth_authentications_total", "result" => failure.as_str())
                    .increment(1);
                match failure {
                    AuthFailure::StoreUnavailable => {
                        tracing::warn!(reason = failure.as_str(), "Authentication failed")
                    }
                    _ => tracing::debug!(reason = failure.as_str(), "Authentication failed"),
                }
            }
        }

        result
    }

    async fn verify(&self, carrier: SessionCarrier) -> Result<Session, AuthFailure> {
        let claims = self.codec.decode(&carrier.token)?;

        let revoked = self
            .revocations
            .is_revoked(&carrier.token)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, backend = self.revocations.backend(), "Revocation lookup failed");
                AuthFailure::StoreUnavailable
            })?;
        if revoked {
            return Err(AuthFailure::Revoked);
        }

        if !carrier.channel.accepts(claims.role) {
            return Err(AuthFailure::ChannelMismatch);
        }

        let principal = claims.principal()?;
        Ok(Session {
            carrier,
            claims,
            principal,
        })
    }
}
