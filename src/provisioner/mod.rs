mod docker;
mod fake;

pub use docker::DockerProvisioner;
pub use fake::FakeProvisioner;

use async_trait::async_trait;

use crate::error::PoolError;
use crate::pool::types::ProvisionedWorker;

/// External adapter contract over whatever actually creates and tears down workers.
///
/// Each call constructs whatever transient client state it needs internally: there is
/// no shared mutable state across calls, and each returns a tagged result rather than
/// panicking, so the supervisor never sees a partial worker.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Creates a new worker, idempotent per call (always makes a new one).
    async fn provision(&self) -> Result<ProvisionedWorker, PoolError>;

    /// Restarts an existing worker and revalidates its egress IP.
    async fn restart_and_check(&self, name: &str) -> Result<ProvisionedWorker, PoolError>;

    /// Destroys the underlying resource. Callers treat failure as best-effort.
    async fn delete(&self, name: &str) -> Result<(), PoolError>;
}
