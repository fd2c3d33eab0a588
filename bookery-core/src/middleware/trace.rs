//! Request span maker that keeps session tokens out of logs.
//!
//! Tokens travel in cookies and the `Authorization` header, neither of which
//! is recorded, but links such as magic-login URLs can still carry one in the
//! query string. Those values are redacted before the URI is logged.

use axum::http::{Request, Uri};
use tower_http::trace::MakeSpan;
use tracing::Span;

use crate::tenancy::TENANT_SLUG_HEADER;

/// Query parameter names whose values are redacted in logs
const SENSITIVE_PARAMS: &[&str] = &[
    "token",
    "access_token",
    "auth-token",
    "auth_token",
    "jwt",
    "session",
    "password",
];

#[derive(Clone, Debug)]
pub struct SanitizedMakeSpan;

impl<B> MakeSpan<B> for SanitizedMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let tenant = request
            .headers()
            .get(TENANT_SLUG_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %sanitize_uri(request.uri()),
            tenant = %tenant,
            version = ?request.version(),
        )
    }
}

fn sanitize_uri(uri: &Uri) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if SENSITIVE_PARAMS.contains(&key.to_ascii_lowercase().as_str()) => {
                format!("{key}=[REDACTED]")
            }
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", uri.path(), pairs.join("&"))
}
