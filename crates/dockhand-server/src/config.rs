use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::time::Duration;

use clap::Parser;
use dockhand_core::InstanceDescriptor;
use dockhand_registry::RegistryConfig;
use tracing::warn;
use uuid::Uuid;

#[derive(Parser, Debug, Clone)]
#[command(name = "dockhand-server")]
#[command(about = "Docker and Kubernetes management facade", long_about = None)]
pub struct ServerConfig {
    /// Port the facade listens on and advertises to the registry
    #[arg(long, env = "DOCKHAND_PORT", default_value_t = 31001)]
    pub port: u16,

    /// Logical service name registered with the registry
    #[arg(long, env = "DOCKHAND_SERVICE_NAME", default_value = "dockhand")]
    pub service_name: String,

    /// Address advertised to the registry; resolved from the hostname when unset
    #[arg(long, env = "DOCKHAND_ADVERTISE_IP")]
    pub advertise_ip: Option<IpAddr>,

    #[arg(
        long,
        env = "DOCKHAND_REGISTRY_URL",
        default_value = "http://127.0.0.1:8848/nacos/v1"
    )]
    pub registry_url: String,

    #[arg(long, env = "DOCKHAND_REGISTRY_USERNAME", default_value = "nacos")]
    pub registry_username: String,

    #[arg(long, env = "DOCKHAND_REGISTRY_PASSWORD", default_value = "nacos")]
    pub registry_password: String,

    /// Registry tenant to register under
    #[arg(long, env = "DOCKHAND_REGISTRY_NAMESPACE", default_value_t = Uuid::nil())]
    pub registry_namespace: Uuid,

    /// Local validity margin for registry tokens; keep below the registry's
    /// own token lifetime
    #[arg(long, env = "DOCKHAND_TOKEN_VALIDITY_SECS", default_value_t = 16_000)]
    pub token_validity_secs: u64,

    #[arg(long, env = "DOCKHAND_BEAT_INTERVAL_SECS", default_value_t = 5)]
    pub beat_interval_secs: u64,

    #[arg(long, env = "DOCKHAND_REGISTRY_TIMEOUT_SECS", default_value_t = 10)]
    pub registry_timeout_secs: u64,

    /// Docker Engine API endpoint
    #[arg(long, env = "DOCKER_HOST", default_value = "http://127.0.0.1:2375")]
    pub docker_host: String,

    /// Kubernetes API server endpoint
    #[arg(long, env = "KUBE_API_SERVER", default_value = "https://127.0.0.1:6443")]
    pub kube_api_server: String,

    /// Bearer token for the Kubernetes API server
    #[arg(long, env = "KUBE_TOKEN")]
    pub kube_token: Option<String>,

    /// Accept self-signed Kubernetes API server certificates
    #[arg(long, env = "KUBE_INSECURE_TLS")]
    pub kube_insecure_tls: bool,
}

impl ServerConfig {
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            base_url: self.registry_url.clone(),
            username: self.registry_username.clone(),
            password: self.registry_password.clone(),
            token_validity: Duration::from_secs(self.token_validity_secs),
            beat_interval: Duration::from_secs(self.beat_interval_secs),
            request_timeout: Duration::from_secs(self.registry_timeout_secs),
        }
    }

    pub fn instance_descriptor(&self) -> InstanceDescriptor {
        let ip = self.advertise_ip.unwrap_or_else(detect_advertise_ip);
        InstanceDescriptor::new(
            self.service_name.clone(),
            ip,
            self.port,
            self.registry_namespace,
        )
    }
}

/// Resolves the machine's own hostname to the address the registry should
/// hand out. Falls back to loopback when the hostname does not resolve, which
/// at least keeps registration and beats flowing.
fn detect_advertise_ip() -> IpAddr {
    let host = hostname::get().ok().and_then(|h| h.into_string().ok());
    if let Some(host) = host {
        if let Ok(mut addrs) = (host.as_str(), 0u16).to_socket_addrs() {
            if let Some(addr) = addrs.find(|a| a.is_ipv4()) {
                return addr.ip();
            }
        }
        warn!("hostname {host} did not resolve, advertising loopback");
    }
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
