//! HTTP middleware for Bookery Core
//!
//! - Tenant resolution from the request host
//! - Session extractors and the access guard for protected route groups
//! - Error body normalization, request metrics and log-safe request spans

pub mod auth;
pub mod error_response;
pub mod metrics;
pub mod require_auth;
pub mod tenant;
pub mod trace;

pub use auth::AuthPrincipal;
pub use error_response::normalize_error_response;
pub use metrics::RequestTelemetryLayer;
pub use require_auth::{require_access, AccessGuard};
pub use tenant::resolve_tenant;
pub use trace::SanitizedMakeSpan;
