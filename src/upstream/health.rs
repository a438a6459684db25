use crate::config::HealthCheckConfig;
use crate::directory::{HostStatus, ServiceDirectory};
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// Build a shared HTTP client for health checks. The per-probe timeout is
/// applied on each request, so the client itself only bounds connect time.
pub fn build_health_check_client(connect_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .no_proxy()
        .build()
}

/// One unit of probe work: a single host of a single service.
#[derive(Debug, Clone)]
struct ProbeTarget {
    service: String,
    address: String,
    url: String,
}

/// Consecutive results for one host. Exactly one of the two is non-zero.
#[derive(Debug, Default, Clone, Copy)]
struct Streak {
    successes: u32,
    failures: u32,
}

/// Periodically probes every registered host and writes the observed status
/// back into the directory.
///
/// With both thresholds at 1 (the default) a single probe result overwrites
/// the host status unconditionally. Larger thresholds require that many
/// consecutive identical results before the status is written.
pub struct HealthProber {
    directory: ServiceDirectory,
    config: HealthCheckConfig,
    client: reqwest::Client,
    streaks: DashMap<String, Streak>,
}

impl HealthProber {
    pub fn new(
        directory: ServiceDirectory,
        config: HealthCheckConfig,
        client: reqwest::Client,
    ) -> Self {
        Self {
            directory,
            config,
            client,
            streaks: DashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.config.interval()
    }

    /// Run a single probe cycle across every host of every service.
    ///
    /// The directory is read once up front; its lock is released before any
    /// probe is sent. The caller owns the loop.
    pub async fn run_health_checks(&self) {
        let targets = self.collect_targets();
        self.purge_stale_streaks(&targets);

        if targets.is_empty() {
            debug!("health: no hosts registered, skipping cycle");
            return;
        }

        let total = targets.len();
        stream::iter(targets)
            .map(|target| async move { self.check_one_host(&target).await })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect::<()>()
            .await;

        debug!("health: cycle completed, hosts={}", total);
    }

    fn collect_targets(&self) -> Vec<ProbeTarget> {
        self.directory
            .get_all()
            .into_iter()
            .flat_map(|record| {
                let port = record.port;
                let service = record.name;
                record
                    .hosts
                    .into_iter()
                    .map(|host| ProbeTarget {
                        url: format!(
                            "{}://{}{}",
                            self.config.scheme,
                            host.authority(port),
                            self.config.path
                        ),
                        service: service.clone(),
                        address: host.address,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    async fn check_one_host(&self, target: &ProbeTarget) {
        let result = self
            .client
            .get(&target.url)
            .timeout(self.config.timeout())
            .send()
            .await;

        let healthy = match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!(
                    "health: probe failed, service={}, host={}, status={}",
                    target.service,
                    target.address,
                    resp.status()
                );
                false
            }
            Err(e) => {
                debug!(
                    "health: probe failed, service={}, host={}, timeout={}, error={}",
                    target.service,
                    target.address,
                    e.is_timeout(),
                    e
                );
                false
            }
        };

        metrics::counter!(
            "relay_health_check_total",
            "service" => target.service.clone(),
            "result" => if healthy { "success" } else { "failure" },
        )
        .increment(1);

        let Some(status) = self.record_result(&streak_key(target), healthy) else {
            return;
        };

        metrics::gauge!(
            "relay_upstream_health_status",
            "service" => target.service.clone(),
            "host" => target.address.clone(),
        )
        .set(if status.is_active() { 1.0 } else { 0.0 });

        self.directory
            .set_host_status(&target.service, &target.address, status);
    }

    /// Extend the streak for `key` and return the status to write, if the
    /// relevant threshold has been reached.
    fn record_result(&self, key: &str, healthy: bool) -> Option<HostStatus> {
        let mut entry = self.streaks.entry(key.to_string()).or_default();
        let streak = entry.value_mut();
        if healthy {
            streak.failures = 0;
            streak.successes = streak.successes.saturating_add(1);
            (streak.successes >= self.config.healthy_threshold).then_some(HostStatus::Active)
        } else {
            streak.successes = 0;
            streak.failures = streak.failures.saturating_add(1);
            (streak.failures >= self.config.unhealthy_threshold).then_some(HostStatus::Inactive)
        }
    }

    fn purge_stale_streaks(&self, targets: &[ProbeTarget]) {
        let live: HashSet<String> = targets.iter().map(streak_key).collect();
        self.streaks.retain(|k, _| live.contains(k));
    }
}

fn streak_key(target: &ProbeTarget) -> String {
    format!("{}/{}", target.service, target.address)
}
