use std::time::Instant;

use serde::Serialize;

/// State of a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Valid,
    Invalid,
}

/// One proxy worker managed by the pool.
///
/// `last_updated` is measured against `epoch`, a [`std::time::Instant`] captured at
/// process start, rather than wall-clock time: it only needs to be monotonic within a
/// single process and a `Mutex`-guarded `Instant` based clock cannot regress across a
/// clock adjustment the way `SystemTime` can.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRecord {
    pub name: String,
    pub container_id: String,
    pub proxy_port: u16,
    pub proxy_url: String,
    pub ip_seen: String,
    pub state: WorkerState,
    pub last_updated: u64,
}

impl WorkerRecord {
    pub fn new(provisioned: ProvisionedWorker, epoch: Instant) -> Self {
        Self {
            name: provisioned.name,
            container_id: provisioned.container_id,
            proxy_port: provisioned.proxy_port,
            proxy_url: provisioned.proxy_url,
            ip_seen: provisioned.ip_seen,
            state: WorkerState::Valid,
            last_updated: epoch.elapsed().as_secs(),
        }
    }

    pub fn touch(&mut self, provisioned: ProvisionedWorker, epoch: Instant) {
        self.container_id = provisioned.container_id;
        self.proxy_port = provisioned.proxy_port;
        self.proxy_url = provisioned.proxy_url;
        self.ip_seen = provisioned.ip_seen;
        self.state = WorkerState::Valid;
        self.last_updated = epoch.elapsed().as_secs();
    }

    pub fn sanitized(&self) -> SanitizedWorker {
        SanitizedWorker {
            status: "ok",
            container_id: self.container_id.clone(),
            container_name: self.name.clone(),
            proxy_port: self.proxy_port,
            proxy_url: self.proxy_url.clone(),
            ip_seen: self.ip_seen.clone(),
        }
    }
}

/// The shape returned by a successful [`crate::provisioner::Provisioner`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedWorker {
    pub name: String,
    pub container_id: String,
    pub proxy_port: u16,
    pub proxy_url: String,
    pub ip_seen: String,
}

/// Public, sanitized view of a worker handed out to HTTP clients.
///
/// Never carries `state`, `last_updated`, or any pool-internal bookkeeping, per
/// the sanitized public view never leaks internal bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedWorker {
    pub status: &'static str,
    pub container_id: String,
    pub container_name: String,
    pub proxy_port: u16,
    pub proxy_url: String,
    pub ip_seen: String,
}
