use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Name of the configuration file written by `proxy-pool-service init` and read at
/// process start.
pub const POOL_CONFIG_FILE_NAME: &str = "proxy-pool-service.toml";

const ALLOWED_PORT_MIN: u16 = 8887;
const ALLOWED_PORT_MAX: u16 = 20000;

/// Static, process-lifetime configuration of the pool.
///
/// Loaded once at start-up from a TOML file (created by the `init` subcommand) merged
/// with environment variables prefixed `PPS_`. Nothing in the HTTP API can mutate it:
/// a `/new_proxy` request that echoes a different configuration is rejected with
/// [`crate::error::PoolError::ConfigMismatch`] rather than silently applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolConfig {
    /// Host the HTTP API binds to.
    pub host: String,
    /// Port the HTTP API binds to.
    pub port: u16,
    /// Number of valid workers the supervisor aims to maintain at all times.
    pub container_pool_size: usize,
    /// Lower bound of the proxy port range handed to the provisioner.
    pub port_min: u16,
    /// Upper bound of the proxy port range handed to the provisioner.
    pub port_max: u16,
    /// Timeout in seconds for a worker to become healthy after creation/restart.
    pub health_timeout: u64,
    /// Timeout in seconds for a single validation request through a worker.
    pub request_timeout: u64,
    /// Recognized config-echo key from the original per-request API; not otherwise
    /// consulted by the pool's own create/repair policy (see `max_repair_attempts`).
    pub max_attempts: usize,
    /// Repair attempts budget before a worker is deleted and replaced, and the budget
    /// a `sweep()` call spends per worker before giving up and replacing it.
    pub max_repair_attempts: i64,
    /// Wall-clock deadline, in seconds, for a single `sweep()` call.
    pub sweep_deadline_secs: u64,
    /// Fixed back-off, in seconds, between failed create-task attempts.
    pub create_backoff_secs: u64,
    /// Polling interval, in milliseconds, for a client-side wait loop against
    /// `wait_until_ready`. Not consulted by the server itself.
    pub available_workers_polling_interval_ms: u64,
    /// Interval, in seconds, between background periodic sweeps, run in addition to
    /// the on-demand `/maintenance/sweep` pass. `0` disables the periodic loop.
    pub health_check_interval_secs: u64,
    /// Host the Prometheus exposition endpoint binds to.
    pub metrics_host: String,
    /// Port the Prometheus exposition endpoint binds to.
    pub metrics_port: u16,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            container_pool_size: 8,
            port_min: ALLOWED_PORT_MIN,
            port_max: ALLOWED_PORT_MAX,
            health_timeout: 45,
            request_timeout: 15,
            max_attempts: 5,
            max_repair_attempts: 3,
            sweep_deadline_secs: 15,
            create_backoff_secs: 3,
            available_workers_polling_interval_ms: 20,
            health_check_interval_secs: 30,
            metrics_host: "127.0.0.1".into(),
            metrics_port: 9898,
        }
    }
}

/// Subset of [`PoolConfig`] a client may echo on `/new_proxy` to assert its
/// expectations. The pool is configured once at process start, and any
/// echo that disagrees is a `400 pool_config_is_static`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ConfigEcho {
    pub container_pool_size: Option<usize>,
    pub port_min: Option<u16>,
    pub port_max: Option<u16>,
    pub health_timeout: Option<u64>,
    pub request_timeout: Option<u64>,
    pub max_attempts: Option<usize>,
}

impl ConfigEcho {
    /// Returns `true` if every field present in the echo matches the active config.
    pub fn matches(&self, active: &PoolConfig) -> bool {
        fn agrees<T: PartialEq>(echoed: Option<T>, actual: T) -> bool {
            match echoed {
                Some(v) => v == actual,
                None => true,
            }
        }

        agrees(self.container_pool_size, active.container_pool_size)
            && agrees(self.port_min, active.port_min)
            && agrees(self.port_max, active.port_max)
            && agrees(self.health_timeout, active.health_timeout)
            && agrees(self.request_timeout, active.request_timeout)
            && agrees(self.max_attempts, active.max_attempts)
    }
}

impl PoolConfig {
    /// Loads the config file from the current directory, merged with `PPS_`-prefixed
    /// environment variable overrides, falling back to defaults for anything absent.
    /// The file is expected to live in the current working directory under
    /// [`POOL_CONFIG_FILE_NAME`].
    pub fn load_from_file() -> Result<PoolConfig, String> {
        let mut current_dir = std::env::current_dir().map_err(|err| err.to_string())?;
        current_dir.push(POOL_CONFIG_FILE_NAME);

        let figment = Figment::from(Serialized::defaults(PoolConfig::default()))
            .merge(Toml::file(&current_dir))
            .merge(Env::prefixed("PPS_"));

        figment
            .extract()
            .map_err(|err| format!("failed to load {}: {err}", current_dir.display()))
    }
}
