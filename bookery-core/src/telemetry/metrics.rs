//! Prometheus metrics setup and metric definitions

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    // Seconds. Auth checks are in-memory, so the low buckets matter most.
    let buckets = [
        0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit initial zero values so Prometheus output
/// includes HELP/TYPE lines for all metrics from startup (not just after first use).
pub fn describe_metrics() {
    // HTTP metrics
    describe_counter!("bookery_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "bookery_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "bookery_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    // Tenancy and auth metrics
    describe_counter!(
        "bookery_tenant_resolutions_total",
        "Host resolutions by outcome (tenant/no_tenant)"
    );
    describe_counter!(
        "bookery_auth_authentications_total",
        "Session authentications by result"
    );
    describe_counter!(
        "bookery_authz_decisions_total",
        "Access guard decisions by result"
    );
    describe_counter!(
        "bookery_revocations_total",
        "Session tokens revoked, by backend"
    );
    describe_counter!(
        "bookery_revocations_pruned_total",
        "Expired revocation entries removed by the pruner"
    );

    counter!("bookery_auth_authentications_total", "result" => "success").absolute(0);
    counter!("bookery_authz_decisions_total", "result" => "allow").absolute(0);
    counter!("bookery_revocations_pruned_total").absolute(0);
    gauge!("bookery_http_requests_in_flight").set(0.0);
}
