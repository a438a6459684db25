pub mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use anyhow::Result;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;

/// Parse a config file by extension. Returns `None` when the file is absent.
fn read_config_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let parsed = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)?,
        Some("json") => serde_json::from_str(&content)?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some(ext) => anyhow::bail!("unsupported config format: .{ext}, use .toml, .json or .yaml"),
        None => anyhow::bail!("config file has no extension, use .toml, .json or .yaml"),
    };
    Ok(Some(parsed))
}

impl DirectoryConfig {
    /// Load the directory configuration. The static service list is the only
    /// source of services, so a missing file is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let Some(config) = read_config_file::<DirectoryConfig>(path)? else {
            anyhow::bail!("no valid configuration in: {}", path.display());
        };

        config.validate()?;
        tracing::info!(
            services = config.services.len(),
            hosts = config.services.iter().map(|s| s.hosts.len()).sum::<usize>(),
            "loaded directory configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let hc = &self.health_check;
        if hc.interval_ms == 0 {
            anyhow::bail!("health_check.interval_ms must be positive");
        }
        if hc.timeout_ms == Some(0) {
            anyhow::bail!("health_check.timeout_ms must be positive");
        }
        if hc.concurrency == 0 {
            anyhow::bail!("health_check.concurrency must be positive");
        }
        if hc.healthy_threshold == 0 || hc.unhealthy_threshold == 0 {
            anyhow::bail!("health_check thresholds must be at least 1");
        }
        if !hc.path.starts_with('/') {
            anyhow::bail!("health_check.path '{}' must start with '/'", hc.path);
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if service.name.is_empty() {
                anyhow::bail!("service with empty id");
            }
            if !seen.insert(service.name.as_str()) {
                anyhow::bail!("duplicate service id '{}'", service.name);
            }
            if service.port == 0 {
                anyhow::bail!("service '{}' has port 0", service.name);
            }
            if service.hosts.iter().any(|h| h.address.is_empty()) {
                anyhow::bail!("service '{}' has an empty host entry", service.name);
            }
        }
        Ok(())
    }
}

impl GatewayConfig {
    /// Load configuration from a file (if it exists) and apply environment
    /// variable overrides. Without a file, built-in defaults are used.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match read_config_file::<GatewayConfig>(path)? {
            Some(c) => c,
            None => {
                tracing::info!("config file not found at {}, using defaults", path.display());
                GatewayConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            discovery = %config.discovery.address,
            poll_interval_ms = config.discovery.poll_interval_ms,
            "loaded gateway configuration"
        );
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("REGISTRY_HOSTNAME") {
            if !v.is_empty() {
                self.discovery.address = format!("http://{}:8081", v);
            }
        }
        // An explicit address wins over the bare hostname.
        if let Ok(v) = std::env::var("RELAY_DISCOVERY_ADDRESS") {
            self.discovery.address = v;
        }
        if let Ok(v) = std::env::var("RELAY_POLL_INTERVAL_MS") {
            if let Ok(n) = v.parse::<u64>() {
                self.discovery.poll_interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("RELAY_AUTH_TOKEN") {
            self.access.token = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.discovery.address.is_empty() {
            anyhow::bail!("discovery.address must not be empty");
        }
        if self.discovery.poll_interval_ms == 0 {
            anyhow::bail!("discovery.poll_interval_ms must be positive");
        }
        if self.discovery.timeout_ms == 0 {
            anyhow::bail!("discovery.timeout_ms must be positive");
        }
        if self.upstream.timeout_ms == 0 {
            anyhow::bail!("upstream.timeout_ms must be positive");
        }
        if self.upstream.scheme != "http" && self.upstream.scheme != "https" {
            anyhow::bail!("unsupported upstream scheme '{}'", self.upstream.scheme);
        }
        if self.access.token.is_empty() {
            anyhow::bail!("access.token must not be empty");
        }
        for route in &self.access.public_routes {
            if !route.starts_with('/') {
                anyhow::bail!("public route '{}' must start with '/'", route);
            }
        }
        Ok(())
    }
}
