//! Session endpoints: logout and the current session

use axum::{extract::State, http::HeaderMap, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{extract_session_carrier, SessionChannel};
use crate::authz::{confirm_tenant, GrantedScope};
use crate::config::CookieConfig;
use crate::domain::Principal;
use crate::error::{AppError, Result};
use crate::jwt::DecodeError;
use crate::middleware::AuthPrincipal;
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Principal,
}

/// Expired cookie that makes the browser drop `name`.
/// Path and domain must match the cookie that was set at login.
fn removal_cookie(name: &'static str, config: &CookieConfig) -> Cookie<'static> {
    let mut builder = Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax);
    if let Some(domain) = &config.domain {
        builder = builder.domain(domain.clone());
    }

    let mut cookie = builder.build();
    cookie.make_removal();
    cookie
}

/// Expire every session cookie that arrived with the request
fn clear_session_cookies(mut jar: CookieJar, config: &CookieConfig) -> CookieJar {
    for name in SessionChannel::COOKIES.iter().filter_map(|c| c.cookie_name()) {
        if jar.get(name).is_some() {
            jar = jar.add(removal_cookie(name, config));
        }
    }
    jar
}

/// POST /api/auth/logout
///
/// Revokes the presented token and clears the session cookies sent with it.
/// Succeeds for absent, invalid, expired or already revoked tokens alike.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LogoutResponse>)> {
    let jar = clear_session_cookies(jar, &state.config.cookies);
    let Some(carrier) = extract_session_carrier(&headers) else {
        return Ok((jar, Json(LogoutResponse { success: true })));
    };

    match state.authenticator.codec().decode(&carrier.token) {
        Ok(claims) => {
            let horizon = Utc::now() + Duration::seconds(state.config.revocation.retention_secs);
            let retain_until = claims
                .expires_at()
                .map_or(horizon, |exp| exp.max(horizon));

            state
                .revocations()
                .revoke_until(&carrier.token, retain_until)
                .await
                .map_err(|e| AppError::Unavailable(format!("revocation write failed: {}", e)))?;
            tracing::info!(
                subject = %claims.id,
                role = %claims.role,
                channel = carrier.channel.as_str(),
                "Session revoked"
            );
        }
        Err(DecodeError::Expired) => {
            tracing::debug!("Logout with an expired token, nothing to revoke");
        }
        Err(e) => {
            tracing::debug!(reason = %e, "Logout with an unverifiable token, not stored");
        }
    }

    Ok((jar, Json(LogoutResponse { success: true })))
}

/// GET /api/auth/session
///
/// Members of a tenant that was suspended or removed after sign-in get
/// `TENANT_NOT_FOUND` instead of their session.
pub async fn session(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<SessionResponse>> {
    if let Some(id) = principal.tenant_id().filter(|_| !principal.is_system_admin()) {
        confirm_tenant(state.tenants.as_ref(), &principal, GrantedScope::OwnTenant(id)).await?;
    }

    Ok(Json(SessionResponse { user: principal }))
}
