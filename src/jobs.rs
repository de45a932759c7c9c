use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use uuid::Uuid;

use crate::pool::SanitizedWorker;

/// Status of an asynchronously-dispatched `/new_proxy_async` request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub status: JobStatus,
    pub result: Option<JobResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JobResult {
    Worker(SanitizedWorker),
    Error { message: String },
}

/// Process-lifetime, in-memory job tracker. Job-id tracking is classified as
/// thin glue over the pool core; it is not part of the supervisor's own state and is
/// never guarded by `pool_lock`.
#[derive(Default)]
pub struct JobTracker {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> String {
        let job_id = Uuid::new_v4().to_string();
        self.jobs
            .lock()
            .expect("jobs lock poisoned")
            .insert(job_id.clone(), JobRecord { status: JobStatus::Queued, result: None });
        job_id
    }

    pub fn mark_running(&self, job_id: &str) {
        if let Some(job) = self.jobs.lock().expect("jobs lock poisoned").get_mut(job_id) {
            job.status = JobStatus::Running;
        }
    }

    pub fn complete(&self, job_id: &str, worker: SanitizedWorker) {
        let mut jobs = self.jobs.lock().expect("jobs lock poisoned");
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = JobStatus::Done;
            job.result = Some(JobResult::Worker(worker));
        }
    }

    pub fn fail(&self, job_id: &str, message: String) {
        let mut jobs = self.jobs.lock().expect("jobs lock poisoned");
        if let Some(job) = jobs.get_mut(job_id) {
            job.status = JobStatus::Error;
            job.result = Some(JobResult::Error { message });
        }
    }

    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.lock().expect("jobs lock poisoned").get(job_id).cloned()
    }
}
