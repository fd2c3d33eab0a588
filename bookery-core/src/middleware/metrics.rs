//! Per-request telemetry: an `x-request-id` span plus Prometheus series
//! labelled by route template.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    response::Response,
};
use metrics::{counter, gauge, histogram};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::{Duration, Instant},
};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request id that is echoed back
const MAX_REQUEST_ID_LEN: usize = 128;

/// Route label for requests no route matched
const UNMATCHED_ROUTE: &str = "unmatched";

/// Caller's request id when usable, otherwise a fresh UUID
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_string)
}

/// Labels shared by the request counter and latency histogram
struct RouteLabels {
    method: String,
    route: String,
}

impl RouteLabels {
    fn of(request: &Request<Body>) -> Self {
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map_or(UNMATCHED_ROUTE, MatchedPath::as_str);
        Self {
            method: request.method().to_string(),
            route: route.to_string(),
        }
    }

    fn record(self, status: StatusCode, elapsed: Duration) {
        counter!(
            "bookery_http_requests_total",
            "method" => self.method.clone(),
            "route" => self.route.clone(),
            "status" => status.as_u16().to_string()
        )
        .increment(1);
        histogram!(
            "bookery_http_request_duration_seconds",
            "method" => self.method,
            "route" => self.route
        )
        .record(elapsed.as_secs_f64());
    }
}

/// Holds one unit of the in-flight gauge until dropped, so cancelled
/// requests are released too.
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        gauge!("bookery_http_requests_in_flight").increment(1.0);
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        gauge!("bookery_http_requests_in_flight").decrement(1.0);
    }
}

#[derive(Clone, Copy, Default)]
pub struct RequestTelemetryLayer;

impl<S> Layer<S> for RequestTelemetryLayer {
    type Service = RequestTelemetry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTelemetry { inner }
    }
}

#[derive(Clone)]
pub struct RequestTelemetry<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestTelemetry<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let id = request_id(request.headers());
        let labels = RouteLabels::of(&request);
        let span = tracing::info_span!("http", request_id = %id);
        // Take the ready clone, leave a fresh one for the next poll_ready
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let handle = async move {
            let guard = InFlight::enter();
            let started = Instant::now();
            let mut response = inner.call(request).await?;
            drop(guard);

            labels.record(response.status(), started.elapsed());
            if let Ok(value) = HeaderValue::from_str(&id) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Ok(response)
        };
        Box::pin(handle.instrument(span))
    }
}
