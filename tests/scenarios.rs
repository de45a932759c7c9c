//! Concrete scenarios against a deterministic fake provisioner, one test per scenario.

use std::sync::Arc;
use std::time::Duration;

use proxy_pool_service::config::PoolConfig;
use proxy_pool_service::pool::{PoolSupervisor, SweepStatus};
use proxy_pool_service::provisioner::FakeProvisioner;

fn config(pool_size: usize) -> PoolConfig {
    PoolConfig { container_pool_size: pool_size, ..PoolConfig::default() }
}

#[tokio::test(flavor = "multi_thread")]
async fn initial_fill_reaches_target_size() {
    let provisioner = Arc::new(FakeProvisioner::new());
    let supervisor = PoolSupervisor::new(config(2), provisioner, true);
    supervisor.start();

    let ready = supervisor.wait_until_ready(2, Duration::from_secs(5)).await;

    assert!(ready);
    assert_eq!(supervisor.valid_count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn handout_alternates_between_valid_workers() {
    let provisioner = Arc::new(FakeProvisioner::new());
    let supervisor = PoolSupervisor::new(config(2), provisioner, true);
    supervisor.start();
    assert!(supervisor.wait_until_ready(2, Duration::from_secs(5)).await);

    let first = supervisor.acquire().unwrap();
    let second = supervisor.acquire().unwrap();
    let third = supervisor.acquire().unwrap();

    assert_eq!(first.container_name, "w-1");
    assert_eq!(second.container_name, "w-2");
    assert_eq!(third.container_name, "w-1");
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_success_path_recovers_the_flagged_worker() {
    let provisioner = Arc::new(FakeProvisioner::new());
    let supervisor = PoolSupervisor::new(config(2), provisioner, true);
    supervisor.start();
    assert!(supervisor.wait_until_ready(2, Duration::from_secs(5)).await);

    let replacement = supervisor.schedule_restart("w-1").await.unwrap();
    assert_eq!(replacement.container_name, "w-2");

    let report = supervisor.sweep().await;
    assert_eq!(report.processed.len(), 1);
    let entry = &report.processed[0];
    assert_eq!(entry.container_name, "w-1");
    assert!(matches!(entry.status, SweepStatus::Recovered));
    assert_eq!(entry.attempts, 1);

    let registry = supervisor.list();
    assert_eq!(registry.get("w-1").unwrap().state, proxy_pool_service::pool::WorkerState::Valid);
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_failure_replaces_the_worker() {
    let provisioner = Arc::new(FakeProvisioner::new());
    provisioner.fail_restart_for("w-1");
    let supervisor = PoolSupervisor::new(config(2), provisioner, true);
    supervisor.start();
    assert!(supervisor.wait_until_ready(2, Duration::from_secs(5)).await);

    let replacement = supervisor.schedule_restart("w-1").await.unwrap();
    assert_eq!(replacement.container_name, "w-2");

    let report = supervisor.sweep().await;
    assert_eq!(report.processed.len(), 1);
    let entry = &report.processed[0];
    assert_eq!(entry.container_name, "w-1");
    assert!(matches!(entry.status, SweepStatus::Replaced));
    assert_eq!(entry.attempts, supervisor.config().max_repair_attempts);
    assert!(entry.error.is_some());

    assert!(!supervisor.list().contains_key("w-1"));

    assert!(supervisor.wait_until_ready(2, Duration::from_secs(5)).await);
    assert_eq!(supervisor.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn config_mismatch_is_rejected() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    let provisioner = Arc::new(FakeProvisioner::new());
    let config = config(1);
    let supervisor = PoolSupervisor::new(config.clone(), provisioner, false);

    let db_dir = tempfile::tempdir().unwrap();
    let state = proxy_pool_service::api::AppState {
        supervisor,
        jobs: Arc::new(proxy_pool_service::jobs::JobTracker::new()),
        bad_connections: Arc::new(
            proxy_pool_service::bad_connections::BadConnections::load_or_create(db_dir.path())
                .unwrap(),
        ),
        config,
    };
    let app = proxy_pool_service::api::router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/new_proxy")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"port_min": 1}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_worker_restart_fails_with_not_found() {
    let provisioner = Arc::new(FakeProvisioner::new());
    let supervisor = PoolSupervisor::new(config(1), provisioner, true);
    supervisor.start();
    assert!(supervisor.wait_until_ready(1, Duration::from_secs(5)).await);

    let result = supervisor.schedule_restart("does-not-exist").await;
    assert!(matches!(result, Err(proxy_pool_service::error::PoolError::NotFound(_))));
}
