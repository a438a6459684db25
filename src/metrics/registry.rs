use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Histogram bucket boundaries for latency metrics (seconds).
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Thin handle around the global metrics recorder.
///
/// After `Metrics::install()` the `metrics` crate macros can be used anywhere.
/// Without a recorder they are no-ops, which is what unit tests rely on. The
/// `PrometheusHandle` is retained solely for rendering `/metrics`.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric descriptions.
    /// Call once per process, before serving.
    pub fn install() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("_duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )?
            .install_recorder()?;

        // dispatcher
        describe_counter!(
            "relay_http_requests_total",
            Unit::Count,
            "Total HTTP requests processed by the gateway"
        );
        describe_histogram!(
            "relay_http_request_duration_seconds",
            Unit::Seconds,
            "Total request duration from client perspective"
        );
        describe_histogram!(
            "relay_upstream_request_duration_seconds",
            Unit::Seconds,
            "Time spent waiting for the selected backend"
        );

        // discovery
        describe_counter!(
            "relay_discovery_poll_total",
            Unit::Count,
            "Discovery fetch attempts by result"
        );
        describe_gauge!(
            "relay_snapshot_services",
            Unit::Count,
            "Number of services in the current routing snapshot"
        );

        // health
        describe_counter!(
            "relay_health_check_total",
            Unit::Count,
            "Total health probes by result"
        );
        describe_gauge!(
            "relay_upstream_health_status",
            Unit::Count,
            "Host health: 1=active 0=inactive"
        );

        // connections
        describe_counter!(
            "relay_connections_total",
            Unit::Count,
            "Downstream connections accepted by the proxy listener"
        );
        describe_gauge!(
            "relay_connections_active",
            Unit::Count,
            "Number of active downstream connections"
        );

        Ok(Self { handle })
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
