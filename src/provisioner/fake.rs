use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::PoolError;
use crate::pool::types::ProvisionedWorker;

use super::Provisioner;

/// Deterministic provisioner for tests: produces sequential names `w-1`, `w-2`, … and
/// IPs `10.0.0.k`, for deterministic test fixtures.
///
/// `restart_and_check` and `delete` can be configured to fail for specific names, to
/// drive the restart-failure/replace scenario without a real Docker daemon.
pub struct FakeProvisioner {
    next_id: AtomicU64,
    always_fail_restart: Mutex<std::collections::HashSet<String>>,
}

impl FakeProvisioner {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), always_fail_restart: Mutex::new(Default::default()) }
    }

    /// Marks `name` so that every future `restart_and_check` call against it fails.
    pub fn fail_restart_for(&self, name: impl Into<String>) {
        self.always_fail_restart.lock().expect("lock poisoned").insert(name.into());
    }
}

impl Default for FakeProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn provision(&self) -> Result<ProvisionedWorker, PoolError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let name = format!("w-{id}");
        Ok(ProvisionedWorker {
            container_id: format!("cid-{name}"),
            proxy_port: 9000 + id as u16,
            proxy_url: format!("http://127.0.0.1:{}", 9000 + id as u16),
            ip_seen: format!("10.0.0.{id}"),
            name,
        })
    }

    async fn restart_and_check(&self, name: &str) -> Result<ProvisionedWorker, PoolError> {
        if self.always_fail_restart.lock().expect("lock poisoned").contains(name) {
            return Err(PoolError::ProvisionerFailed(format!("forced restart failure for {name}")));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(ProvisionedWorker {
            name: name.to_string(),
            container_id: format!("cid-{name}"),
            proxy_port: 9000 + id as u16,
            proxy_url: format!("http://127.0.0.1:{}", 9000 + id as u16),
            ip_seen: format!("10.0.0.{id}"),
        })
    }

    async fn delete(&self, name: &str) -> Result<(), PoolError> {
        self.always_fail_restart.lock().expect("lock poisoned").remove(name);
        Ok(())
    }
}
