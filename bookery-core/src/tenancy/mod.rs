//! Subdomain tenant resolution
//!
//! Maps a request host such as `mari-nails.bookery.app:443` to the tenant slug
//! `mari-nails`. The parse runs in three stages (strip port, split labels,
//! classify) and always ends in a [`TenantResolution`]; a host without a
//! tenant is a normal outcome, not an error.

use axum::{
    extract::FromRequestParts,
    http::{header::HOST, request::Parts, HeaderMap, Uri},
};

use crate::config::TenancyConfig;
use crate::domain::TenantSlug;

/// Request header carrying the resolved slug to downstream handlers
pub const TENANT_SLUG_HEADER: &str = "x-tenant-slug";

const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";

/// Outcome of resolving a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantResolution {
    Tenant(TenantSlug),
    NoTenant,
}

impl TenantResolution {
    pub fn slug(&self) -> Option<&TenantSlug> {
        match self {
            TenantResolution::Tenant(slug) => Some(slug),
            TenantResolution::NoTenant => None,
        }
    }

    pub fn is_tenant(&self) -> bool {
        matches!(self, TenantResolution::Tenant(_))
    }
}

/// Stateless host-to-tenant resolver
#[derive(Debug, Clone)]
pub struct TenantResolver {
    reserved_labels: Vec<String>,
    bypass_paths: Vec<String>,
    trust_forwarded_host: bool,
}

impl TenantResolver {
    pub fn new(config: &TenancyConfig) -> Self {
        Self {
            reserved_labels: config
                .reserved_labels
                .iter()
                .map(|l| l.to_ascii_lowercase())
                .collect(),
            bypass_paths: config
                .bypass_paths
                .iter()
                .map(|p| p.trim_end_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            trust_forwarded_host: config.trust_forwarded_host,
        }
    }

    /// Resolve a raw host value (`Host` header form, port allowed).
    pub fn resolve_host(&self, host: &str) -> TenantResolution {
        let Some(hostname) = strip_port(host.trim()) else {
            return TenantResolution::NoTenant;
        };
        let hostname = hostname.to_ascii_lowercase();
        let Some(labels) = split_labels(&hostname) else {
            return TenantResolution::NoTenant;
        };
        self.classify(&labels)
    }

    /// Resolve from request headers, falling back to the URI authority.
    pub fn resolve_request(&self, headers: &HeaderMap, uri: &Uri) -> TenantResolution {
        match request_host(headers, uri, self.trust_forwarded_host) {
            Some(host) => self.resolve_host(&host),
            None => TenantResolution::NoTenant,
        }
    }

    /// Infrastructure paths that skip tenant resolution and access checks.
    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn classify(&self, labels: &[&str]) -> TenantResolution {
        if labels.len() <= 2 {
            return TenantResolution::NoTenant;
        }
        let candidate = labels[0];
        if self.is_reserved(candidate) {
            return TenantResolution::NoTenant;
        }
        match TenantSlug::parse(candidate) {
            Ok(slug) => TenantResolution::Tenant(slug),
            Err(_) => TenantResolution::NoTenant,
        }
    }

    fn is_reserved(&self, label: &str) -> bool {
        // Numeric labels cover loopback hosts like 127.0.0.1.nip.io
        self.reserved_labels.iter().any(|r| r == label) || label.bytes().all(|b| b.is_ascii_digit())
    }
}

/// Drop the `:port` suffix. IPv6 literals never name a tenant.
fn strip_port(host: &str) -> Option<&str> {
    if host.is_empty() || host.starts_with('[') {
        return None;
    }
    match host.split_once(':') {
        None => Some(host),
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            Some(name)
        }
        Some(_) => None,
    }
}

/// Split into labels; a fully-qualified trailing dot is allowed, empty labels are not.
fn split_labels(hostname: &str) -> Option<Vec<&str>> {
    let hostname = hostname.strip_suffix('.').unwrap_or(hostname);
    let labels: Vec<&str> = hostname.split('.').collect();
    if labels.iter().any(|l| l.is_empty()) {
        return None;
    }
    Some(labels)
}

fn request_host(headers: &HeaderMap, uri: &Uri, trust_forwarded_host: bool) -> Option<String> {
    if trust_forwarded_host {
        let forwarded = headers
            .get(FORWARDED_HOST_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(host) = forwarded {
            return Some(host.to_string());
        }
    }

    headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
}

/// Reads the resolution attached by the tenant middleware. Bypassed paths
/// carry none and read as [`TenantResolution::NoTenant`].
impl<S> FromRequestParts<S> for TenantResolution
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<TenantResolution>()
            .cloned()
            .unwrap_or(TenantResolution::NoTenant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn resolver() -> TenantResolver {
        TenantResolver::new(&TenancyConfig::default())
    }

    fn tenant(slug: &str) -> TenantResolution {
        TenantResolution::Tenant(TenantSlug::parse(slug).unwrap())
    }

    #[rstest]
    #[case("mari-nails.tenant.example", "mari-nails")]
    #[case("mari-nails.tenant.example:3000", "mari-nails")]
    #[case("Mari-Nails.Tenant.Example", "mari-nails")]
    #[case("mari-nails.tenant.example.", "mari-nails")]
    #[case("sub.127.0.0.1.nip.io", "sub")]
    #[case("salon42.bookery.co.uk", "salon42")]
    fn test_resolves_subdomain(#[case] host: &str, #[case] slug: &str) {
        assert_eq!(resolver().resolve_host(host), tenant(slug));
    }

    #[rstest]
    #[case("tenant.example")]
    #[case("www.tenant.example")]
    #[case("app.tenant.example")]
    #[case("localhost.tenant.example")]
    #[case("localhost:3000")]
    #[case("localhost")]
    #[case("127.0.0.1")]
    #[case("127.0.0.1:8080")]
    #[case("127.0.0.1.nip.io")]
    #[case("[::1]:3000")]
    #[case("::1")]
    #[case("")]
    #[case("a..tenant.example")]
    #[case("-bad.tenant.example")]
    #[case("under_score.tenant.example")]
    #[case("mari-nails.tenant.example:http")]
    fn test_no_tenant(#[case] host: &str) {
        assert_eq!(resolver().resolve_host(host), TenantResolution::NoTenant);
    }

    #[test]
    fn test_custom_reserved_labels() {
        let config = TenancyConfig {
            reserved_labels: vec!["API".to_string()],
            ..TenancyConfig::default()
        };
        let resolver = TenantResolver::new(&config);

        assert_eq!(
            resolver.resolve_host("api.bookery.app"),
            TenantResolution::NoTenant
        );
        assert_eq!(resolver.resolve_host("www.bookery.app"), tenant("www"));
    }

    #[rstest]
    #[case("/api/auth", true)]
    #[case("/api/auth/logout", true)]
    #[case("/health", true)]
    #[case("/ready", true)]
    #[case("/api/init", true)]
    #[case("/api/init/admin", true)]
    #[case("/healthz", false)]
    #[case("/api/authority", false)]
    #[case("/api/business/context", false)]
    #[case("/", false)]
    fn test_bypass_paths(#[case] path: &str, #[case] bypassed: bool) {
        assert_eq!(resolver().is_bypassed(path), bypassed);
    }

    #[test]
    fn test_resolve_request_uses_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "mari-nails.bookery.app".parse().unwrap());
        let uri: Uri = "/api/business/context".parse().unwrap();

        assert_eq!(resolver().resolve_request(&headers, &uri), tenant("mari-nails"));
    }

    #[test]
    fn test_resolve_request_falls_back_to_authority() {
        let headers = HeaderMap::new();
        let uri: Uri = "https://other-salon.bookery.app/api/business/context"
            .parse()
            .unwrap();

        assert_eq!(resolver().resolve_request(&headers, &uri), tenant("other-salon"));
    }

    #[test]
    fn test_forwarded_host_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "internal.svc.cluster".parse().unwrap());
        headers.insert(
            FORWARDED_HOST_HEADER,
            "mari-nails.bookery.app, proxy.local".parse().unwrap(),
        );
        let uri: Uri = "/".parse().unwrap();

        assert_eq!(resolver().resolve_request(&headers, &uri), tenant("internal"));

        let trusting = TenantResolver::new(&TenancyConfig {
            trust_forwarded_host: true,
            ..TenancyConfig::default()
        });
        assert_eq!(trusting.resolve_request(&headers, &uri), tenant("mari-nails"));
    }

    #[test]
    fn test_missing_host_is_no_tenant() {
        let uri: Uri = "/".parse().unwrap();
        assert_eq!(
            resolver().resolve_request(&HeaderMap::new(), &uri),
            TenantResolution::NoTenant
        );
    }

    #[test]
    fn test_resolution_accessors() {
        let resolved = tenant("mari-nails");
        assert!(resolved.is_tenant());
        assert_eq!(resolved.slug().map(|s| s.as_str()), Some("mari-nails"));
        assert!(TenantResolution::NoTenant.slug().is_none());
    }
}
