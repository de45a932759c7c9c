use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::provisioner::Provisioner;

use super::registry::PoolState;
use super::task_queue::{self, Task};
use super::types::SanitizedWorker;

/// Orchestrates the registry, readiness index, and task queue.
///
/// `pool_lock` is a [`std::sync::Mutex`], not a `tokio::sync::Mutex`: every method
/// that needs to hold it across a suspension point releases it first and re-acquires
/// afterwards, so the lock is never held across an `.await`. Holding a std mutex guard
/// across an await point fails to compile, which turns the never-hold-the-lock-across-
/// an-await rule into a property the compiler checks.
pub struct PoolSupervisor {
    pool_lock: Arc<std::sync::Mutex<PoolState>>,
    ready: Arc<Notify>,
    provisioner: Arc<dyn Provisioner>,
    task_tx: UnboundedSender<Task>,
    config: PoolConfig,
    started: AtomicBool,
    background: bool,
}

impl PoolSupervisor {
    /// `background` disables the filler and worker-loop background tasks when false,
    /// disabling the filler and worker loop so every handout falls back to `create_sync`.
    pub fn new(config: PoolConfig, provisioner: Arc<dyn Provisioner>, background: bool) -> Arc<Self> {
        let (task_tx, task_rx) = task_queue::channel();
        let supervisor = Arc::new(Self {
            pool_lock: Arc::new(std::sync::Mutex::new(PoolState::new())),
            ready: Arc::new(Notify::new()),
            provisioner,
            task_tx,
            config,
            started: AtomicBool::new(false),
            background,
        });

        if background {
            let lock = supervisor.pool_lock.clone();
            let ready = supervisor.ready.clone();
            let provisioner = supervisor.provisioner.clone();
            let config = supervisor.config.clone();
            let tx = supervisor.task_tx.clone();
            tokio::spawn(task_queue::run(task_rx, tx, lock, ready, provisioner, config));
        } else {
            // Nothing consumes `task_rx` in non-background mode; drop it so senders
            // fail fast instead of silently queuing forever.
            drop(task_rx);
        }

        supervisor
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.pool_lock.lock().expect("pool lock poisoned")
    }

    fn enqueue(&self, task_for_generation: impl FnOnce(u64) -> Task) {
        let generation = self.lock().generation();
        let _ = self.task_tx.send(task_for_generation(generation));
    }

    /// Publishes the current pool-size and pending-task gauges. Called after every
    /// mutation that could change them, both here and from the task queue worker loop.
    pub(crate) fn sync_gauges(&self) {
        let state = self.lock();
        crate::metrics::POOL_SIZE_VALID.set(state.valid_count() as i64);
        crate::metrics::POOL_SIZE_TOTAL.set(state.len() as i64);
        crate::metrics::PENDING_CREATES.set(state.pending_creates() as i64);
        crate::metrics::PENDING_REPAIRS.set(state.pending_repairs() as i64);
    }

    // start()
    // ============================================================================

    /// Idempotent. Launches the initial-fill filler and, if `background` mode is
    /// enabled, the worker loop was already spawned by [`Self::new`]. Running the
    /// filler here (rather than at construction) lets callers control when the first
    /// wave of `Provision` calls fires.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.background {
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let target = this.config.container_pool_size;
                let valid_count = this.lock().valid_count();
                if valid_count >= target {
                    info!(target, "initial fill complete");
                    return;
                }
                match this.provisioner.provision().await {
                    Ok(worker) => {
                        {
                            let mut state = this.lock();
                            state.store_valid(worker);
                        }
                        this.sync_gauges();
                        this.ready.notify_waiters();
                    }
                    Err(err) => {
                        warn!(error = %err, "initial fill attempt failed, retrying in 3s");
                        tokio::time::sleep(Duration::from_secs(3)).await;
                    }
                }
            }
        });

        if self.config.health_check_interval_secs > 0 {
            let this = self.clone();
            tokio::spawn(async move {
                let interval = Duration::from_secs(this.config.health_check_interval_secs);
                loop {
                    tokio::time::sleep(interval).await;
                    let report = this.sweep().await;
                    if !report.processed.is_empty() {
                        info!(processed = report.processed.len(), "periodic sweep completed");
                    }
                }
            });
        }
    }

    /// Blocks up to `timeout` for `|valid_set| >= min`. Loops on each notification
    /// because a single `notified()` can race a concurrent increment that already
    /// satisfied the condition before this call started waiting.
    pub async fn wait_until_ready(&self, min: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.lock().valid_count() >= min {
                return true;
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return self.lock().valid_count() >= min;
            }
            let notified = self.ready.notified();
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return self.lock().valid_count() >= min;
            }
        }
    }

    // HANDOUT
    // ============================================================================

    /// Pure, non-blocking. Returns a sanitized snapshot via the readiness index.
    pub fn acquire(&self) -> Option<SanitizedWorker> {
        let record = self.lock().acquire_valid();
        match record {
            Some(record) => {
                crate::metrics::ACQUIRE_COUNT.inc();
                Some(record.sanitized())
            }
            None => {
                crate::metrics::ACQUIRE_EMPTY_COUNT.inc();
                None
            }
        }
    }

    /// Synchronously invokes the provisioner outside the lock; used as a handout
    /// fallback when the pool is empty.
    pub async fn create_sync(&self) -> Option<SanitizedWorker> {
        match self.provisioner.provision().await {
            Ok(worker) => {
                let record = {
                    let mut state = self.lock();
                    state.store_valid(worker)
                };
                self.sync_gauges();
                self.ready.notify_waiters();
                Some(record.sanitized())
            }
            Err(err) => {
                warn!(error = %err, "create_sync failed");
                None
            }
        }
    }

    /// Handout with the full fallback chain spec'd for `/new_proxy`: `acquire()`, else
    /// `create_sync()`, else `NoAvailableWorker`.
    pub async fn handout(&self) -> PoolResult<SanitizedWorker> {
        if let Some(worker) = self.acquire() {
            return Ok(worker);
        }
        self.create_sync().await.ok_or(PoolError::NoAvailableWorker)
    }

    // MUTATIONS
    // ============================================================================

    /// Flags `name` invalid and for restart, then returns a replacement via the same
    /// fallback chain as [`Self::handout`]. The actual restart is deferred to the next
    /// `sweep()` call, keeping the request's critical path bounded.
    pub async fn schedule_restart(&self, name: &str) -> PoolResult<SanitizedWorker> {
        {
            let mut state = self.lock();
            if !state.contains(name) {
                return Err(PoolError::NotFound(name.to_string()));
            }
            state.mark_invalid(name);
            state.flag_needs_restart(name);
        }

        self.handout().await
    }

    /// Removes `name` from the pool entirely. If it existed, schedules a replacement
    /// create task to restore target size.
    pub fn remove(&self, name: &str) -> bool {
        let existed = self.lock().remove(name);
        if existed {
            self.schedule_create();
        }
        existed
    }

    /// Clears all pool state and schedules `container_pool_size` fresh create tasks.
    pub fn reset(&self) {
        self.lock().clear();
        for _ in 0..self.config.container_pool_size {
            self.schedule_create();
        }
    }

    /// Snapshot copy of the registry.
    pub fn list(&self) -> std::collections::HashMap<String, super::types::WorkerRecord> {
        self.lock().snapshot()
    }

    pub fn valid_count(&self) -> usize {
        self.lock().valid_count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn pending_creates(&self) -> usize {
        self.lock().pending_creates()
    }

    pub(crate) fn names_needing_sweep(&self) -> Vec<String> {
        self.lock().names_needing_sweep()
    }

    pub(crate) fn provisioner(&self) -> &Arc<dyn Provisioner> {
        &self.provisioner
    }

    pub(crate) fn pool_lock(&self) -> &Arc<std::sync::Mutex<PoolState>> {
        &self.pool_lock
    }

    pub(crate) fn notify_ready(&self) {
        self.ready.notify_waiters();
    }

    pub(crate) fn send_create_task(&self, task: Task) {
        let _ = self.task_tx.send(task);
    }

    /// Commits a create reservation against `target_size` and enqueues a create task.
    /// In non-background mode the task is dropped on arrival since nothing consumes
    /// the channel; callers relying on background fill should construct the
    /// supervisor with `background = true`.
    fn schedule_create(&self) {
        let reserved = {
            let mut state = self.lock();
            state.try_reserve_create(self.config.container_pool_size)
        };
        if reserved {
            self.enqueue(|generation| Task::Create { attempts: 0, generation });
        }
    }
}
