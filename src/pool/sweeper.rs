use serde::Serialize;
use tracing::{info, warn};

use super::supervisor::PoolSupervisor;
use super::task_queue::Task;

/// Outcome of one worker examined during a sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    Recovered,
    Replaced,
    Missing,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepEntry {
    pub container_name: String,
    pub status: SweepStatus,
    pub attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub processed: Vec<SweepEntry>,
}

impl PoolSupervisor {
    /// Synchronous reconciliation pass, run on the caller's own task so operators get
    /// an immediate report instead of the failure being swallowed by the background
    /// loop. Safe to call concurrently with client traffic and with the background
    /// worker loop, since every mutation still goes through the pool lock.
    pub async fn sweep(&self) -> SweepReport {
        let _timer = crate::metrics::SWEEP_DURATION.start_timer();
        let names = self.names_needing_sweep();
        let deadline =
            tokio::time::Instant::now() + std::time::Duration::from_secs(self.config().sweep_deadline_secs);
        let max_attempts = self.config().max_repair_attempts;

        let mut processed = Vec::with_capacity(names.len());
        for name in names {
            if !self.worker_exists(&name) {
                processed.push(SweepEntry {
                    container_name: name,
                    status: SweepStatus::Missing,
                    attempts: 0,
                    error: None,
                });
                continue;
            }

            let entry = self.sweep_one(&name, deadline, max_attempts).await;
            processed.push(entry);
        }

        SweepReport { processed }
    }

    fn worker_exists(&self, name: &str) -> bool {
        self.pool_lock().lock().expect("pool lock poisoned").contains(name)
    }

    async fn sweep_one(
        &self,
        name: &str,
        deadline: tokio::time::Instant,
        max_attempts: i64,
    ) -> SweepEntry {
        let mut attempts: i64 = 0;
        let mut last_error = String::new();

        loop {
            if tokio::time::Instant::now() >= deadline {
                warn!(worker = %name, attempts, "sweep deadline exceeded, replacing");
                return self.sweep_replace(name, attempts, "sweep_deadline_exceeded".to_string()).await;
            }

            attempts += 1;
            match self.provisioner().restart_and_check(name).await {
                Ok(worker) => {
                    {
                        let mut state = self.pool_lock().lock().expect("pool lock poisoned");
                        state.store_valid(worker);
                    }
                    self.notify_ready();
                    crate::metrics::SWEEP_RECOVERED_COUNT.inc();
                    info!(worker = %name, attempts, "sweep recovered worker");
                    return SweepEntry {
                        container_name: name.to_string(),
                        status: SweepStatus::Recovered,
                        attempts,
                        error: None,
                    };
                }
                Err(err) => {
                    last_error = err.to_string();
                    if attempts >= max_attempts {
                        return self.sweep_replace(name, attempts, last_error).await;
                    }
                }
            }
        }
    }

    async fn sweep_replace(&self, name: &str, attempts: i64, error: String) -> SweepEntry {
        if let Err(delete_err) = self.provisioner().delete(name).await {
            warn!(worker = %name, error = %delete_err, "best-effort delete failed during sweep replace");
        }
        {
            let mut state = self.pool_lock().lock().expect("pool lock poisoned");
            state.remove(name);
        }
        self.schedule_replacement_create();
        crate::metrics::SWEEP_REPLACED_COUNT.inc();

        SweepEntry {
            container_name: name.to_string(),
            status: SweepStatus::Replaced,
            attempts,
            error: Some(error),
        }
    }

    fn schedule_replacement_create(&self) {
        let (reserved, generation) = {
            let mut state = self.pool_lock().lock().expect("pool lock poisoned");
            let reserved = state.try_reserve_create(self.config().container_pool_size);
            (reserved, state.generation())
        };
        if reserved {
            self.send_create_task(Task::Create { attempts: 0, generation });
        }
    }
}
