use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::config::PoolConfig;
use crate::metrics;
use crate::provisioner::Provisioner;

use super::registry::PoolState;

/// A unit of background work. `attempts` counts prior failed tries at this task;
/// `attempts = -1` is the source's "retry indefinitely" signal, the next enqueue
/// re-enters at `attempts + 1 = 0`.
///
/// Repair of an already-registered worker is not a queued task kind here: `sweep()`
/// performs restart-with-retry synchronously on the caller's thread (see
/// `pool/sweeper.rs`), which is the only path that turns a flagged worker back into
/// a valid one. `Create` is the only background task kind because it is the only one
/// a caller never waits on the result of.
#[derive(Debug, Clone)]
pub enum Task {
    Create { attempts: i64, generation: u64 },
}

pub fn channel() -> (UnboundedSender<Task>, UnboundedReceiver<Task>) {
    mpsc::unbounded_channel()
}

/// Runs until `tx` (and every clone of it) has been dropped, at which point `rx.recv()`
/// returns `None` and the loop exits. Dequeues with a 1s timeout to stay responsive to
/// shutdown.
pub async fn run(
    mut rx: UnboundedReceiver<Task>,
    tx: UnboundedSender<Task>,
    lock: Arc<std::sync::Mutex<PoolState>>,
    ready: Arc<Notify>,
    provisioner: Arc<dyn Provisioner>,
    config: PoolConfig,
) {
    loop {
        let task = match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                info!("task queue closed, worker loop exiting");
                return;
            }
            Err(_) => continue,
        };

        match task {
            Task::Create { attempts, generation } => {
                handle_create(attempts, generation, &tx, &lock, &ready, provisioner.as_ref(), &config)
                    .await
            }
        }
    }
}

async fn handle_create(
    attempts: i64,
    generation: u64,
    tx: &UnboundedSender<Task>,
    lock: &Arc<std::sync::Mutex<PoolState>>,
    ready: &Arc<Notify>,
    provisioner: &dyn Provisioner,
    config: &PoolConfig,
) {
    match provisioner.provision().await {
        Ok(worker) => {
            let name = worker.name.clone();
            let stale = {
                let mut state = lock.lock().expect("pool lock poisoned");
                if state.generation() != generation {
                    true
                } else {
                    state.store_valid(worker);
                    state.release_create_reservation();
                    false
                }
            };
            if stale {
                info!(worker = %name, "discarding create result from a reset pool generation");
                return;
            }
            ready.notify_waiters();
            metrics::CREATE_TASK_OUTCOME.with_label_values(&["ok"]).inc();
            info!(worker = %name, "create task succeeded");
        }
        Err(err) => {
            metrics::CREATE_TASK_OUTCOME.with_label_values(&["failed"]).inc();
            warn!(error = %err, attempts, "create task failed");
            let next_attempts = if attempts + 1 >= config.max_repair_attempts {
                -1
            } else {
                attempts + 1
            };
            let tx = tx.clone();
            let backoff = Duration::from_secs(config.create_backoff_secs);
            tokio::spawn(async move {
                tokio::time::sleep(backoff).await;
                let _ = tx.send(Task::Create { attempts: next_attempts, generation });
            });
        }
    }
}
