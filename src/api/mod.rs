mod handlers;

pub use handlers::metrics;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::bad_connections::BadConnections;
use crate::config::PoolConfig;
use crate::jobs::JobTracker;
use crate::pool::PoolSupervisor;

/// Shared handler state. `supervisor` is the only piece guarded by its own internal
/// lock; everything else here is either immutable or independently synchronized, so
/// `AppState` itself needs no lock.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<PoolSupervisor>,
    pub jobs: Arc<JobTracker>,
    pub bad_connections: Arc<BadConnections>,
    pub config: PoolConfig,
}

/// Builds the HTTP API router, plus the ambient `/health` and `/metrics` endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/new_proxy", post(handlers::new_proxy))
        .route("/new_proxy_async", post(handlers::new_proxy_async))
        .route("/new_proxies", post(handlers::new_proxies))
        .route("/job/:id", get(handlers::get_job))
        .route("/restart_and_check", post(handlers::restart_and_check))
        .route("/maintenance/sweep", post(handlers::sweep))
        .route("/proxies", get(handlers::list_proxies).delete(handlers::delete_all_proxies))
        .route("/proxy/:name", get(handlers::get_proxy).delete(handlers::delete_proxy))
        .route("/report_bad", post(handlers::report_bad))
        .route("/bad_connections", get(handlers::list_bad_connections))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
