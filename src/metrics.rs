use std::sync::LazyLock;

use prometheus::{
    Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder, register_histogram,
    register_int_counter, register_int_counter_vec, register_int_gauge,
};

// SAFETY: the `unwrap` calls here are safe because the metric names and descriptions
// are hardcoded and registered exactly once per process, so registration can only
// fail on a naming collision, which a code review would catch immediately.

// POOL SIZE METRICS
// ================================================================================================

pub static POOL_SIZE_VALID: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("pool_size_valid", "Number of workers currently valid").unwrap()
});
pub static POOL_SIZE_TOTAL: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("pool_size_total", "Total number of workers in the registry").unwrap()
});
pub static PENDING_CREATES: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("pending_creates", "Create tasks committed but not yet completed").unwrap()
});
pub static PENDING_REPAIRS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("pending_repairs", "Workers currently flagged as pending repair").unwrap()
});

// HANDOUT METRICS
// ================================================================================================

pub static ACQUIRE_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("acquire_count", "Number of acquire() calls that returned a worker")
        .unwrap()
});
pub static ACQUIRE_EMPTY_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "acquire_empty_count",
        "Number of acquire() calls that found no valid worker"
    )
    .unwrap()
});

// TASK OUTCOME METRICS
// ================================================================================================

pub static CREATE_TASK_OUTCOME: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "create_task_outcome",
        "Outcome of create tasks processed by the worker loop",
        &["outcome"]
    )
    .unwrap()
});

// SWEEP METRICS
// ================================================================================================

pub static SWEEP_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "sweep_duration_seconds",
        "Wall-clock time spent in a sweep() call",
        vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 30.0]
    )
    .unwrap()
});
pub static SWEEP_RECOVERED_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("sweep_recovered_count", "Workers recovered by a sweep").unwrap()
});
pub static SWEEP_REPLACED_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("sweep_replaced_count", "Workers replaced by a sweep").unwrap()
});

/// Renders the default Prometheus registry in text exposition format.
///
/// Used by the `GET /metrics` handler. Returns an error string on the (practically
/// unreachable) encoding failure path rather than panicking.
pub fn render() -> Result<String, String> {
    let metric_families = prometheus::gather();
    TextEncoder::new().encode_to_string(&metric_families).map_err(|err| err.to_string())
}
