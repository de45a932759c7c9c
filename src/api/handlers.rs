use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::ConfigEcho;
use crate::error::{PoolError, PoolResult};
use crate::jobs::{JobResult, JobStatus};
use crate::pool::SanitizedWorker;

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct NewProxyRequest {
    #[serde(flatten)]
    pub config_echo: ConfigEcho,
}

/// Request bodies on these endpoints are entirely optional (an absent or empty body
/// means "use the pool's active configuration"). `Json<T>` always demands a body be
/// present, so bodies are read as raw bytes and parsed only when non-empty.
fn parse_body<T: serde::de::DeserializeOwned + Default>(bytes: &Bytes) -> PoolResult<T> {
    if bytes.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|err| PoolError::InternalFailure(format!("invalid request body: {err}")))
}

#[derive(Debug, Serialize)]
pub struct AcceptedJob {
    status: &'static str,
    job_id: String,
}

#[instrument(skip(state, body), fields(container_pool_size = state.config.container_pool_size))]
pub async fn new_proxy(
    State(state): State<AppState>,
    body: Bytes,
) -> PoolResult<Json<SanitizedWorker>> {
    check_config_echo(&state, &body)?;
    let worker = state.supervisor.handout().await?;
    Ok(Json(worker))
}

#[instrument(skip(state, body))]
pub async fn new_proxy_async(
    State(state): State<AppState>,
    body: Bytes,
) -> PoolResult<Json<AcceptedJob>> {
    check_config_echo(&state, &body)?;

    let job_id = state.jobs.create();
    let supervisor = state.supervisor.clone();
    let jobs = state.jobs.clone();
    let job_id_for_task = job_id.clone();

    tokio::spawn(async move {
        jobs.mark_running(&job_id_for_task);
        match supervisor.handout().await {
            Ok(worker) => jobs.complete(&job_id_for_task, worker),
            Err(err) => jobs.fail(&job_id_for_task, err.to_string()),
        }
    });

    Ok(Json(AcceptedJob { status: "accepted", job_id }))
}

#[derive(Debug, Deserialize)]
pub struct NewProxiesRequest {
    #[serde(flatten)]
    pub config_echo: ConfigEcho,
    #[serde(default = "default_count")]
    pub count: usize,
}

impl Default for NewProxiesRequest {
    fn default() -> Self {
        NewProxiesRequest { config_echo: ConfigEcho::default(), count: default_count() }
    }
}

fn default_count() -> usize {
    1
}

#[derive(Debug, Serialize)]
pub struct BatchResult {
    status: &'static str,
    count_requested: usize,
    count_ok: usize,
    count_error: usize,
    proxies: Vec<SanitizedWorker>,
    errors: Vec<String>,
}

/// Batch creation outside the `target_size` accounting, run sequentially rather than
/// concurrently to keep load on the provisioner predictable.
#[instrument(skip(state, body))]
pub async fn new_proxies(
    State(state): State<AppState>,
    body: Bytes,
) -> PoolResult<Json<BatchResult>> {
    let req: NewProxiesRequest = parse_body(&body)?;
    if !req.config_echo.matches(&state.config) {
        return Err(PoolError::ConfigMismatch);
    }
    let count = req.count.max(1);

    let mut proxies = Vec::new();
    let mut errors = Vec::new();
    for _ in 0..count {
        match state.supervisor.create_sync().await {
            Some(worker) => proxies.push(worker),
            None => errors.push("provisioner_failed".to_string()),
        }
    }

    let status = match (proxies.is_empty(), errors.is_empty()) {
        (false, true) => "ok",
        (false, false) => "partial",
        _ => "error",
    };

    Ok(Json(BatchResult {
        status,
        count_requested: count,
        count_ok: proxies.len(),
        count_error: errors.len(),
        proxies,
        errors,
    }))
}

#[derive(Debug, Serialize)]
pub struct JobView {
    status: JobStatus,
    result: Option<JobResult>,
    job_id: String,
}

#[instrument(skip(state))]
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> PoolResult<Json<JobView>> {
    let job = state.jobs.get(&job_id).ok_or_else(|| PoolError::NotFound(job_id.clone()))?;
    Ok(Json(JobView { status: job.status, result: job.result, job_id }))
}

#[derive(Debug, Deserialize)]
pub struct RestartAndCheckRequest {
    pub container_name: String,
}

#[derive(Debug, Serialize)]
pub struct RestartAndCheckResponse {
    scheduled_for_restart: bool,
    replacement: SanitizedWorker,
}

#[instrument(skip(state), fields(container_name = %body.container_name))]
pub async fn restart_and_check(
    State(state): State<AppState>,
    Json(body): Json<RestartAndCheckRequest>,
) -> PoolResult<Json<RestartAndCheckResponse>> {
    let replacement = state.supervisor.schedule_restart(&body.container_name).await?;
    Ok(Json(RestartAndCheckResponse { scheduled_for_restart: true, replacement }))
}

#[instrument(skip(state))]
pub async fn sweep(State(state): State<AppState>) -> Json<crate::pool::SweepReport> {
    Json(state.supervisor.sweep().await)
}

#[instrument(skip(state))]
pub async fn list_proxies(State(state): State<AppState>) -> Json<Vec<SanitizedWorker>> {
    let registry = state.supervisor.list();
    Json(registry.into_values().map(|record| record.sanitized()).collect())
}

#[instrument(skip(state))]
pub async fn get_proxy(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> PoolResult<Json<SanitizedWorker>> {
    let registry = state.supervisor.list();
    registry
        .get(&name)
        .map(|record| Json(record.sanitized()))
        .ok_or_else(|| PoolError::NotFound(name))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    status: &'static str,
    deleted: String,
}

#[instrument(skip(state))]
pub async fn delete_proxy(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> PoolResult<Json<DeleteResponse>> {
    if state.supervisor.remove(&name) {
        Ok(Json(DeleteResponse { status: "ok", deleted: name }))
    } else {
        Err(PoolError::NotFound(name))
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteAllResponse {
    status: &'static str,
    deleted: Vec<String>,
}

#[instrument(skip(state))]
pub async fn delete_all_proxies(State(state): State<AppState>) -> Json<DeleteAllResponse> {
    let names: Vec<String> = state.supervisor.list().into_keys().collect();
    let mut deleted = Vec::with_capacity(names.len());
    for name in names {
        if state.supervisor.remove(&name) {
            deleted.push(name);
        }
    }
    Json(DeleteAllResponse { status: "ok", deleted })
}

#[derive(Debug, Deserialize)]
pub struct ReportBadRequest {
    pub config_name: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportBadResponse {
    status: &'static str,
}

#[instrument(skip(state), fields(config_name = %body.config_name))]
pub async fn report_bad(
    State(state): State<AppState>,
    Json(body): Json<ReportBadRequest>,
) -> PoolResult<Json<ReportBadResponse>> {
    state
        .bad_connections
        .mark_bad(body.config_name, body.reason)
        .map_err(|err| PoolError::InternalFailure(err.to_string()))?;
    Ok(Json(ReportBadResponse { status: "ok" }))
}

#[instrument(skip(state))]
pub async fn list_bad_connections(
    State(state): State<AppState>,
) -> Json<Vec<crate::bad_connections::BadEntry>> {
    Json(state.bad_connections.list())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    valid_workers: usize,
    total_workers: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        valid_workers: state.supervisor.valid_count(),
        total_workers: state.supervisor.len(),
    })
}

pub async fn metrics() -> impl IntoResponse {
    match crate::metrics::render() {
        Ok(body) => (axum::http::StatusCode::OK, body),
        Err(err) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

fn check_config_echo(state: &AppState, body: &Bytes) -> PoolResult<()> {
    let req: NewProxyRequest = parse_body(body)?;
    if !req.config_echo.matches(&state.config) {
        return Err(PoolError::ConfigMismatch);
    }
    Ok(())
}
