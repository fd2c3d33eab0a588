//! Server initialization and routing

use crate::api;
use crate::auth::Authenticator;
use crate::authz::RouteScope;
use crate::config::{Config, RevocationBackend};
use crate::jwt::TokenCodec;
use crate::middleware::{
    normalize_error_response, require_access, resolve_tenant, AccessGuard, RequestTelemetryLayer,
    SanitizedMakeSpan,
};
use crate::repository::{TenantRepository, TenantRepositoryImpl};
use crate::revocation::{
    spawn_pruner, InMemoryRevocationStore, RedisRevocationStore, RevocationStore,
};
use crate::tenancy::TenantResolver;
use anyhow::Result;
use axum::{
    extract::FromRef,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub resolver: Arc<TenantResolver>,
    pub authenticator: Authenticator,
    pub tenants: Arc<dyn TenantRepository>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: Config,
        tenants: Arc<dyn TenantRepository>,
        revocations: Arc<dyn RevocationStore>,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        let resolver = Arc::new(TenantResolver::new(&config.tenancy));
        let authenticator = Authenticator::new(TokenCodec::new(&config.jwt), revocations);

        Self {
            config: Arc::new(config),
            resolver,
            authenticator,
            tenants,
            prometheus,
        }
    }

    pub fn revocations(&self) -> &Arc<dyn RevocationStore> {
        self.authenticator.revocations()
    }

    /// Access guard for one route group
    pub fn guard(&self, scope: RouteScope) -> AccessGuard {
        AccessGuard::new(self.authenticator.clone(), self.tenants.clone(), scope)
    }
}

impl FromRef<AppState> for Authenticator {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}

/// Run the server
pub async fn run(config: Config, prometheus: Option<PrometheusHandle>) -> Result<()> {
    // Create database connection pool
    let db_pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    info!("Connected to database");

    let tenants: Arc<dyn TenantRepository> = Arc::new(TenantRepositoryImpl::new(db_pool));

    let retention = chrono::Duration::seconds(config.revocation.retention_secs);
    let revocations: Arc<dyn RevocationStore> = match config.revocation.backend {
        RevocationBackend::Memory => {
            tracing::warn!(
                "Using the in-memory revocation store; revocations are not shared between instances"
            );
            Arc::new(InMemoryRevocationStore::new(retention))
        }
        RevocationBackend::Redis => {
            let store = RedisRevocationStore::new(&config.redis, retention).await?;
            info!("Connected to Redis");
            Arc::new(store)
        }
    };

    let pruner = spawn_pruner(
        revocations.clone(),
        std::time::Duration::from_secs(config.revocation.prune_interval_secs.max(1)),
    );

    let http_addr = config.http_addr();
    let state = AppState::new(config, tenants, revocations, prometheus);
    let app = build_router(state);

    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pruner.abort();
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Build the HTTP router.
///
/// Layers run outermost first: error body normalization, tenant resolution,
/// the request span, then request metrics. Guarded groups carry their own
/// access layer so it only runs for matched routes.
pub fn build_router(state: AppState) -> Router {
    let business = Router::new()
        .route(
            "/api/business/context",
            get(api::context::business_context),
        )
        .route_layer(from_fn_with_state(
            state.guard(api::context::BUSINESS_SCOPE),
            require_access,
        ));

    let customer = Router::new()
        .route(
            "/api/customer/context",
            get(api::context::customer_context),
        )
        .route_layer(from_fn_with_state(
            state.guard(api::context::CUSTOMER_SCOPE),
            require_access,
        ));

    let admin = Router::new()
        .route("/api/admin/context", get(api::context::admin_context))
        .route_layer(from_fn_with_state(
            state.guard(api::context::ADMIN_SCOPE),
            require_access,
        ));

    Router::new()
        // Health endpoints
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready))
        .route("/metrics", get(api::metrics::metrics_handler))
        // Session endpoints
        .route("/api/auth/logout", post(api::session::logout))
        .route("/api/auth/session", get(api::session::session))
        // Guarded groups
        .merge(business)
        .merge(customer)
        .merge(admin)
        // Add middleware
        .layer(RequestTelemetryLayer)
        .layer(TraceLayer::new_for_http().make_span_with(SanitizedMakeSpan))
        .layer(from_fn_with_state(state.resolver.clone(), resolve_tenant))
        .layer(from_fn(normalize_error_response))
        .with_state(state)
}
