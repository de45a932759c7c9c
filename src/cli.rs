use std::fs::File;
use std::io::Write as _;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crate::api::{self, AppState};
use crate::bad_connections::BadConnections;
use crate::config::{POOL_CONFIG_FILE_NAME, PoolConfig};
use crate::jobs::JobTracker;
use crate::pool::PoolSupervisor;
use crate::provisioner::DockerProvisioner;

/// Root CLI for the proxy pool service.
#[derive(Parser, Debug)]
#[clap(
    name = "proxy-pool-service",
    about = "Supervises a warm pool of VPN-backed HTTP proxy containers.",
    version,
    rename_all = "kebab-case"
)]
pub struct Cli {
    #[clap(subcommand)]
    action: Command,
}

#[derive(Debug, Parser)]
pub enum Command {
    /// Writes a default configuration file to the current directory.
    Init(Init),
    /// Starts the pool supervisor and its HTTP API.
    Start(Start),
}

impl Cli {
    pub async fn execute(self) -> Result<(), String> {
        match self.action {
            Command::Init(cmd) => cmd.execute(),
            Command::Start(cmd) => cmd.execute().await,
        }
    }
}

/// Creates a config file for the pool, refusing to overwrite an existing one.
#[derive(Debug, Parser)]
pub struct Init;

impl Init {
    pub fn execute(&self) -> Result<(), String> {
        let mut current_dir = std::env::current_dir().map_err(|err| err.to_string())?;
        current_dir.push(POOL_CONFIG_FILE_NAME);

        if current_dir.exists() {
            return Err(format!(
                "The file \"{}\" already exists in the working directory.",
                POOL_CONFIG_FILE_NAME
            ));
        }

        let config = PoolConfig::default();
        let config_as_toml = toml::to_string_pretty(&config)
            .map_err(|err| format!("error formatting config: {err}"))?;

        let mut file = File::options()
            .write(true)
            .create_new(true)
            .open(&current_dir)
            .map_err(|err| format!("error opening file: {err}"))?;
        file.write_all(config_as_toml.as_bytes())
            .map_err(|err| format!("error writing file: {err}"))?;

        println!("Config file successfully created at: {:?}", current_dir);
        Ok(())
    }
}

/// Starts the pool supervisor, its HTTP API, and the Prometheus exporter.
#[derive(Debug, Parser)]
pub struct Start {
    /// VPN service provider passed to the underlying gluetun containers (e.g.
    /// `custom`, `nordvpn`, `mullvad`).
    #[clap(long, env = "PPS_VPN_SERVICE_PROVIDER", default_value = "custom")]
    vpn_service_provider: String,
    /// VPN username, if the provider requires one.
    #[clap(long, env = "PPS_OPENVPN_USER")]
    vpn_user: Option<String>,
    /// VPN password, if the provider requires one.
    #[clap(long, env = "PPS_OPENVPN_PASSWORD")]
    vpn_password: Option<String>,
    /// Directory holding the bad-configuration blocklist database.
    #[clap(long, env = "PPS_DB_DIR", default_value = "./db")]
    db_dir: String,
    /// Directory of `.ovpn`/`.conf` files to choose from when
    /// `vpn_service_provider` is `custom`.
    #[clap(long, env = "PPS_OVPN_CONFIGS_DIR")]
    ovpn_configs_dir: Option<std::path::PathBuf>,
}

impl Start {
    pub async fn execute(&self) -> Result<(), String> {
        let config = PoolConfig::load_from_file()?;

        let bad_connections = Arc::new(
            BadConnections::load_or_create(&self.db_dir).map_err(|err| err.to_string())?,
        );

        let provisioner: Arc<dyn crate::provisioner::Provisioner> = Arc::new(DockerProvisioner::new(
            config.clone(),
            self.vpn_service_provider.clone(),
            self.vpn_user.clone(),
            self.vpn_password.clone(),
            self.ovpn_configs_dir.clone(),
            bad_connections.clone(),
        )?);

        let supervisor = PoolSupervisor::new(config.clone(), provisioner, true);
        supervisor.start();

        let state = AppState {
            supervisor: supervisor.clone(),
            jobs: Arc::new(JobTracker::new()),
            bad_connections,
            config: config.clone(),
        };

        let router = api::router(state);
        info!(host = %config.host, port = config.port, "starting proxy pool service");
        let std_listener = crate::telemetry::check_port_availability(&config.host, config.port)?;
        std_listener.set_nonblocking(true).map_err(|err| err.to_string())?;
        let listener = tokio::net::TcpListener::from_std(std_listener).map_err(|err| err.to_string())?;

        let std_metrics_listener =
            crate::telemetry::check_port_availability(&config.metrics_host, config.metrics_port)?;
        std_metrics_listener.set_nonblocking(true).map_err(|err| err.to_string())?;
        let metrics_listener = tokio::net::TcpListener::from_std(std_metrics_listener)
            .map_err(|err| err.to_string())?;
        let metrics_router = axum::Router::new().route("/metrics", axum::routing::get(api::metrics));

        tokio::spawn(async move {
            if let Err(err) = axum::serve(metrics_listener, metrics_router).await {
                tracing::error!(error = %err, "metrics server exited");
            }
        });

        axum::serve(listener, router).await.map_err(|err| err.to_string())
    }
}
