use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

// POOL ERROR
// ================================================================================================

/// Error taxonomy for the pool supervisor and its HTTP surface.
///
/// Every variant here maps to one of the kinds described in the design docs: the core
/// never panics or raises across a component boundary for an expected failure, it
/// returns one of these instead.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The operation referred to a worker name that is not in the registry.
    #[error("worker not found: {0}")]
    NotFound(String),

    /// Handout and the synchronous create fallback both failed to produce a worker.
    #[error("no available worker")]
    NoAvailableWorker,

    /// The provisioner adapter returned a non-ok status or raised an error.
    ///
    /// This is swallowed into the retry-or-replace policy almost everywhere; it only
    /// escapes to a caller when a synchronous path (`create_sync`, `sweep`) has no
    /// further retries left.
    #[error("provisioner failed: {0}")]
    ProvisionerFailed(String),

    /// A `/new_proxy` request echoed a configuration that differs from the pool's
    /// static configuration.
    #[error("pool_config_is_static")]
    ConfigMismatch,

    /// An unexpected, structural failure (lock misuse, invariant violation, I/O
    /// failure outside the provisioner contract).
    #[error("internal failure: {0}")]
    InternalFailure(String),
}

impl PoolError {
    fn status_code(&self) -> StatusCode {
        match self {
            PoolError::NotFound(_) => StatusCode::NOT_FOUND,
            PoolError::NoAvailableWorker => StatusCode::SERVICE_UNAVAILABLE,
            PoolError::ProvisionerFailed(_) => StatusCode::BAD_GATEWAY,
            PoolError::ConfigMismatch => StatusCode::BAD_REQUEST,
            PoolError::InternalFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable tag used in the JSON error body.
    fn message(&self) -> String {
        match self {
            PoolError::ConfigMismatch => "pool_config_is_static".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for PoolError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody { status: "error", message: self.message() };
        (status, Json(body)).into_response()
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

impl From<PoolError> for String {
    fn from(err: PoolError) -> Self {
        err.to_string()
    }
}
