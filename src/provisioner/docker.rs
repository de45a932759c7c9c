use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, RestartContainerOptions,
};
use bollard::models::{HostConfig, PortBinding};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::bad_connections::BadConnections;
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::pool::types::ProvisionedWorker;

use super::Provisioner;

const GLUETUN_IMAGE: &str = "qmcgaw/gluetun:latest";
const GLUETUN_HTTP_PORT: &str = "8888/tcp";
const IP_ECHO_URL: &str = "https://api.ipify.org?format=json";
const GLUETUN_CUSTOM_CONFIG_DIR: &str = "/gluetun/custom";
/// Country codes the original prototype favors for better connection rates.
const PREFERRED_COUNTRY_HINTS: [&str; 6] = ["uk", "de", "nl", "ch", "fr", "se"];

/// Provisions VPN-tunnelled HTTP proxy workers backed by `qmcgaw/gluetun` containers,
/// validated by fetching a public IP-echo service through the proxy.
pub struct DockerProvisioner {
    docker: Docker,
    config: PoolConfig,
    vpn_service_provider: String,
    vpn_user: Option<String>,
    vpn_password: Option<String>,
    /// Directory of `.ovpn`/`.conf` files consulted only when
    /// `vpn_service_provider == "custom"`; `None` for a managed provider.
    configs_dir: Option<PathBuf>,
    bad_connections: Arc<BadConnections>,
}

impl DockerProvisioner {
    pub fn new(
        config: PoolConfig,
        vpn_service_provider: String,
        vpn_user: Option<String>,
        vpn_password: Option<String>,
        configs_dir: Option<PathBuf>,
        bad_connections: Arc<BadConnections>,
    ) -> Result<Self, PoolError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|err| PoolError::ProvisionerFailed(format!("docker connect failed: {err}")))?;
        Ok(Self {
            docker,
            config,
            vpn_service_provider,
            vpn_user,
            vpn_password,
            configs_dir,
            bad_connections,
        })
    }

    /// Picks an `.ovpn`/`.conf` file at random from `configs_dir`, preferring names
    /// that hint at a reliable country and excluding anything reported via
    /// `/report_bad`. Only consulted when `vpn_service_provider == "custom"`.
    fn choose_ovpn_config(&self) -> Option<PathBuf> {
        if self.vpn_service_provider != "custom" {
            return None;
        }
        let dir = self.configs_dir.as_ref()?;
        let entries = std::fs::read_dir(dir).ok()?;

        let candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                matches!(path.extension().and_then(|ext| ext.to_str()), Some("ovpn" | "conf"))
            })
            .filter(|path| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                !self.bad_connections.contains(name)
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let preferred: Vec<&PathBuf> = candidates
            .iter()
            .filter(|path| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                PREFERRED_COUNTRY_HINTS.iter().any(|hint| name.contains(hint))
            })
            .collect();
        let pool = if preferred.is_empty() { candidates.iter().collect() } else { preferred };

        pool.choose(&mut rand::thread_rng()).map(|path| (*path).clone())
    }

    fn choose_free_port(&self) -> u16 {
        let mut rng = rand::thread_rng();
        rng.gen_range(self.config.port_min..=self.config.port_max)
    }

    fn environment(&self, ovpn_file: Option<&PathBuf>) -> Vec<String> {
        let mut env = vec!["HTTPPROXY=on".to_string()];
        match ovpn_file {
            Some(path) => {
                let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                env.push("VPN_SERVICE_PROVIDER=custom".to_string());
                env.push(format!("OPENVPN_CUSTOM_CONFIG={GLUETUN_CUSTOM_CONFIG_DIR}/{file_name}"));
            }
            None => env.push(format!("VPN_SERVICE_PROVIDER={}", self.vpn_service_provider)),
        }
        if let Some(user) = &self.vpn_user {
            env.push(format!("OPENVPN_USER={user}"));
        }
        if let Some(password) = &self.vpn_password {
            env.push(format!("OPENVPN_PASSWORD={password}"));
        }
        env
    }

    async fn launch_container(
        &self,
        name: &str,
        host_port: u16,
        ovpn_file: Option<&PathBuf>,
    ) -> Result<String, PoolError> {
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            GLUETUN_HTTP_PORT.to_string(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(host_port.to_string()),
            }]),
        );

        let binds = ovpn_file.and(self.configs_dir.as_ref()).map(|dir| {
            vec![format!("{}:{GLUETUN_CUSTOM_CONFIG_DIR}:ro", dir.to_string_lossy())]
        });

        let host_config = HostConfig {
            cap_add: Some(vec!["NET_ADMIN".to_string()]),
            devices: Some(vec![bollard::models::DeviceMapping {
                path_on_host: Some("/dev/net/tun".to_string()),
                path_in_container: Some("/dev/net/tun".to_string()),
                cgroup_permissions: Some("rwm".to_string()),
            }]),
            port_bindings: Some(port_bindings),
            binds,
            restart_policy: Some(bollard::models::RestartPolicy {
                name: Some(bollard::models::RestartPolicyNameEnum::UNLESS_STOPPED),
                maximum_retry_count: None,
            }),
            network_mode: Some("bridge".to_string()),
            ..Default::default()
        };

        let config = Config {
            image: Some(GLUETUN_IMAGE.to_string()),
            env: Some(self.environment(ovpn_file)),
            exposed_ports: Some(HashMap::from([(GLUETUN_HTTP_PORT.to_string(), HashMap::new())])),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions { name, platform: None };
        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|err| PoolError::ProvisionerFailed(format!("create_container: {err}")))?;

        self.docker
            .start_container::<String>(&response.id, None)
            .await
            .map_err(|err| PoolError::ProvisionerFailed(format!("start_container: {err}")))?;

        Ok(response.id)
    }

    /// Repeatedly attempts validation through `host_port` until `health_timeout`
    /// elapses, polling every 3 seconds.
    async fn wait_for_healthy(&self, host_port: u16) -> Option<String> {
        let deadline = tokio::time::Instant::now()
            + std::time::Duration::from_secs(self.config.health_timeout);
        while tokio::time::Instant::now() < deadline {
            if let Some(ip) = self.validate_proxy(host_port).await {
                return Some(ip);
            }
            tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        }
        None
    }

    async fn validate_proxy(&self, host_port: u16) -> Option<String> {
        let proxy_url = format!("http://127.0.0.1:{host_port}");
        let proxy = reqwest::Proxy::all(&proxy_url).ok()?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(std::time::Duration::from_secs(self.config.request_timeout))
            .build()
            .ok()?;

        let response = client.get(IP_ECHO_URL).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body: serde_json::Value = response.json().await.ok()?;
        body.get("ip").and_then(|v| v.as_str()).map(|s| s.to_string())
    }

    async fn remove_container_best_effort(&self, name: &str) {
        let options = RemoveContainerOptions { force: true, ..Default::default() };
        if let Err(err) = self.docker.remove_container(name, Some(options)).await {
            warn!(worker = %name, error = %err, "best-effort container removal failed");
        }
    }
}

#[async_trait]
impl Provisioner for DockerProvisioner {
    async fn provision(&self) -> Result<ProvisionedWorker, PoolError> {
        let host_port = self.choose_free_port();
        let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
        let name = format!("vpn-proxy-{suffix}");

        let ovpn_file = self.choose_ovpn_config();
        debug!(
            worker = %name,
            port = host_port,
            ovpn_file = ?ovpn_file.as_ref().and_then(|p| p.file_name()),
            "launching gluetun container"
        );
        let container_id = self.launch_container(&name, host_port, ovpn_file.as_ref()).await?;

        let ip_seen = match self.wait_for_healthy(host_port).await {
            Some(ip) => ip,
            None => {
                self.remove_container_best_effort(&name).await;
                return Err(PoolError::ProvisionerFailed("health_timeout".to_string()));
            }
        };

        info!(worker = %name, ip = %ip_seen, "proxy validated");
        Ok(ProvisionedWorker {
            name,
            container_id,
            proxy_port: host_port,
            proxy_url: format!("http://127.0.0.1:{host_port}"),
            ip_seen,
        })
    }

    async fn restart_and_check(&self, name: &str) -> Result<ProvisionedWorker, PoolError> {
        let inspect = self
            .docker
            .inspect_container(name, None)
            .await
            .map_err(|_| PoolError::NotFound(name.to_string()))?;

        let host_port = inspect
            .network_settings
            .as_ref()
            .and_then(|settings| settings.ports.as_ref())
            .and_then(|ports| ports.get(GLUETUN_HTTP_PORT))
            .and_then(|bindings| bindings.as_ref())
            .and_then(|bindings| bindings.first())
            .and_then(|binding| binding.host_port.clone())
            .and_then(|port| port.parse::<u16>().ok())
            .ok_or_else(|| PoolError::ProvisionerFailed("http_port_not_found".to_string()))?;

        let container_id = inspect.id.unwrap_or_else(|| name.to_string());

        self.docker
            .restart_container(name, Some(RestartContainerOptions { t: 30 }))
            .await
            .map_err(|err| PoolError::ProvisionerFailed(format!("restart_failed: {err}")))?;

        let ip_seen = self
            .wait_for_healthy(host_port)
            .await
            .ok_or_else(|| PoolError::ProvisionerFailed("health_timeout".to_string()))?;

        Ok(ProvisionedWorker {
            name: name.to_string(),
            container_id,
            proxy_port: host_port,
            proxy_url: format!("http://127.0.0.1:{host_port}"),
            ip_seen,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), PoolError> {
        self.docker
            .remove_container(name, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await
            .map_err(|err| PoolError::ProvisionerFailed(format!("delete_failed: {err}")))
    }
}
