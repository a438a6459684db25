use crate::directory::ServiceRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Top-level configuration of the service directory process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_directory_listen")]
    pub listen: String,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    /// Static service list loaded into the directory at startup.
    #[serde(default)]
    pub services: Vec<ServiceRecord>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            listen: default_directory_listen(),
            health_check: HealthCheckConfig::default(),
            services: Vec::new(),
        }
    }
}

fn default_directory_listen() -> String {
    "0.0.0.0:8081".to_string()
}

/// Active health probing of every registered host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Time between two probe cycles (milliseconds).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Per-probe timeout (milliseconds). Falls back to `interval_ms` when unset.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_health_path")]
    pub path: String,

    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Maximum number of probes in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Consecutive successes required before a host is marked active.
    #[serde(default = "default_threshold")]
    pub healthy_threshold: u32,

    /// Consecutive failures required before a host is marked inactive.
    #[serde(default = "default_threshold")]
    pub unhealthy_threshold: u32,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(self.interval_ms))
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_ms: None,
            path: default_health_path(),
            scheme: default_scheme(),
            concurrency: default_concurrency(),
            healthy_threshold: default_threshold(),
            unhealthy_threshold: default_threshold(),
        }
    }
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_concurrency() -> usize {
    64
}

fn default_threshold() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Top-level configuration of the load-balancing gateway process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_listen")]
    pub listen: String,

    #[serde(default = "default_admin_listen")]
    pub admin_listen: String,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub access: AccessConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: default_gateway_listen(),
            admin_listen: default_admin_listen(),
            discovery: DiscoveryConfig::default(),
            upstream: UpstreamConfig::default(),
            access: AccessConfig::default(),
        }
    }
}

fn default_gateway_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_admin_listen() -> String {
    "0.0.0.0:9091".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Base URL of the directory's discovery endpoints.
    #[serde(default = "default_discovery_address")]
    pub address: String,

    /// How often to refresh the routing snapshot (milliseconds).
    #[serde(default = "default_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_discovery_timeout_ms")]
    pub timeout_ms: u64,
}

impl DiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            address: default_discovery_address(),
            poll_interval_ms: default_interval_ms(),
            timeout_ms: default_discovery_timeout_ms(),
        }
    }
}

fn default_discovery_address() -> String {
    "http://localhost:8081".to_string()
}

fn default_discovery_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Whole-request budget for one forwarded call (milliseconds).
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            timeout_ms: default_upstream_timeout_ms(),
        }
    }
}

fn default_upstream_timeout_ms() -> u64 {
    30_000
}

/// Route classification and the credential accepted on private routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Upstream routes reachable without credentials. Everything else is private.
    #[serde(default = "default_public_routes")]
    pub public_routes: Vec<String>,

    #[serde(default = "default_token")]
    pub token: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            public_routes: default_public_routes(),
            token: default_token(),
        }
    }
}

fn default_public_routes() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_token() -> String {
    "validToken".to_string()
}
