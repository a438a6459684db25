use super::client::DiscoveryClient;
use crate::directory::ServiceRecord;
use crate::error::RelayError;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Immutable copy of the directory as of one successful discovery fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingSnapshot {
    services: HashMap<String, ServiceRecord>,
    /// Number of successful fetches that produced this snapshot. 0 = never fetched.
    generation: u64,
}

impl RoutingSnapshot {
    /// Build a snapshot from fetched records. A later record with the same
    /// name replaces an earlier one.
    pub fn from_records(records: Vec<ServiceRecord>, generation: u64) -> Self {
        let services = records
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        Self {
            services,
            generation,
        }
    }

    pub fn get(&self, service_name: &str) -> Option<&ServiceRecord> {
        self.services.get(service_name)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Records ordered by service name.
    pub fn records(&self) -> Vec<&ServiceRecord> {
        let mut all: Vec<&ServiceRecord> = self.services.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

/// The gateway's current routing snapshot. Readers take one `Arc` per request
/// and never observe a partially applied update; writers swap whole snapshots.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    current: Arc<ArcSwap<RoutingSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Arc<RoutingSnapshot> {
        self.current.load_full()
    }

    /// `true` once at least one fetch has succeeded.
    pub fn is_ready(&self) -> bool {
        self.current.load().generation > 0
    }

    /// Replace the current snapshot wholesale with `records`.
    pub fn replace(&self, records: Vec<ServiceRecord>) -> Arc<RoutingSnapshot> {
        let generation = self.current.load().generation + 1;
        let next = Arc::new(RoutingSnapshot::from_records(records, generation));
        self.current.store(next.clone());
        next
    }
}

/// Single round of discovery: fetch every record and swap it in.
///
/// On failure the current snapshot is left untouched; the caller retries on
/// its next tick.
pub async fn poll_once(
    client: &DiscoveryClient,
    store: &SnapshotStore,
) -> Result<usize, RelayError> {
    let records = match client.fetch_services().await {
        Ok(records) => records,
        Err(e) => {
            warn!(
                "discovery: fetch failed, keeping previous snapshot, address={}, error={}",
                client.base_url(),
                e
            );
            metrics::counter!("relay_discovery_poll_total", "result" => "error").increment(1);
            return Err(e);
        }
    };

    let snapshot = store.replace(records);
    metrics::counter!("relay_discovery_poll_total", "result" => "success").increment(1);
    metrics::gauge!("relay_snapshot_services").set(snapshot.len() as f64);

    for record in snapshot.records() {
        debug!(
            "discovery: service updated, service={}, hosts={}, active={}, port={}",
            record.name,
            record.hosts.len(),
            record.active_count(),
            record.port
        );
    }
    if snapshot.generation() == 1 {
        info!(
            "discovery: initial snapshot installed, services={}",
            snapshot.len()
        );
    }

    Ok(snapshot.len())
}
