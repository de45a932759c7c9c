//! Properties that must hold for any sequence of supervisor operations.

use std::sync::Arc;
use std::time::Duration;

use proxy_pool_service::config::PoolConfig;
use proxy_pool_service::pool::PoolSupervisor;
use proxy_pool_service::provisioner::FakeProvisioner;

fn config(pool_size: usize) -> PoolConfig {
    PoolConfig { container_pool_size: pool_size, ..PoolConfig::default() }
}

#[tokio::test(flavor = "multi_thread")]
async fn schedule_restart_removes_worker_from_valid_set_before_returning() {
    let provisioner = Arc::new(FakeProvisioner::new());
    let supervisor = PoolSupervisor::new(config(2), provisioner, true);
    supervisor.start();
    assert!(supervisor.wait_until_ready(2, Duration::from_secs(5)).await);

    supervisor.schedule_restart("w-1").await.unwrap();

    let registry = supervisor.list();
    assert_eq!(registry.get("w-1").unwrap().state, proxy_pool_service::pool::WorkerState::Invalid);
}

#[tokio::test(flavor = "multi_thread")]
async fn round_robin_law_never_repeats_consecutively() {
    let provisioner = Arc::new(FakeProvisioner::new());
    let supervisor = PoolSupervisor::new(config(2), provisioner, true);
    supervisor.start();
    assert!(supervisor.wait_until_ready(2, Duration::from_secs(5)).await);

    let mut previous = None;
    for _ in 0..10 {
        let current = supervisor.acquire().unwrap().container_name;
        if let Some(prev) = &previous {
            assert_ne!(prev, &current, "acquire() returned the same worker twice in a row");
        }
        previous = Some(current);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn schedule_restart_is_idempotent_and_yields_two_replacements() {
    let provisioner = Arc::new(FakeProvisioner::new());
    let supervisor = PoolSupervisor::new(config(3), provisioner, true);
    supervisor.start();
    assert!(supervisor.wait_until_ready(3, Duration::from_secs(5)).await);

    let first = supervisor.schedule_restart("w-1").await.unwrap();
    let second = supervisor.schedule_restart("w-1").await.unwrap();

    assert_ne!(first.container_name, second.container_name);
    assert_eq!(supervisor.list().get("w-1").unwrap().state, proxy_pool_service::pool::WorkerState::Invalid);
}

#[tokio::test(flavor = "multi_thread")]
async fn reset_then_wait_until_ready_eventually_succeeds() {
    let provisioner = Arc::new(FakeProvisioner::new());
    let supervisor = PoolSupervisor::new(config(2), provisioner, true);
    supervisor.start();
    assert!(supervisor.wait_until_ready(2, Duration::from_secs(5)).await);

    supervisor.reset();

    assert!(supervisor.wait_until_ready(2, Duration::from_secs(5)).await);
    assert_eq!(supervisor.valid_count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn acquire_never_returns_a_non_valid_record() {
    let provisioner = Arc::new(FakeProvisioner::new());
    let supervisor = PoolSupervisor::new(config(2), provisioner, true);
    supervisor.start();
    assert!(supervisor.wait_until_ready(2, Duration::from_secs(5)).await);

    supervisor.schedule_restart("w-1").await.unwrap();

    // w-1 is now invalid and must never come out of acquire() until the next sweep
    // revalidates it.
    for _ in 0..5 {
        if let Some(worker) = supervisor.acquire() {
            assert_ne!(worker.container_name, "w-1");
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn pending_creates_plus_registry_never_exceeds_target_size() {
    let provisioner = Arc::new(FakeProvisioner::new());
    let supervisor = PoolSupervisor::new(config(2), provisioner, true);
    supervisor.start();
    assert!(supervisor.wait_until_ready(2, Duration::from_secs(5)).await);

    assert!(supervisor.len() + supervisor.pending_creates() <= 2);

    supervisor.remove("w-1");
    assert!(supervisor.len() + supervisor.pending_creates() <= 2);
}
