use super::types::{HostStatus, ServiceRecord};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Authoritative store of all service records, keyed by service name.
///
/// One reader/writer lock covers the whole map. Every operation holds the lock
/// only for the in-memory read or write; callers must never perform network
/// I/O while holding a guard. Cheap to clone, all clones share the same state.
#[derive(Clone, Default)]
pub struct ServiceDirectory {
    services: Arc<RwLock<HashMap<String, ServiceRecord>>>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace records by name. Idempotent.
    pub fn register<I>(&self, records: I)
    where
        I: IntoIterator<Item = ServiceRecord>,
    {
        let mut services = self.write();
        for record in records {
            info!(
                "directory: registered service, service={}, hosts={}, port={}",
                record.name,
                record.hosts.len(),
                record.port
            );
            services.insert(record.name.clone(), record);
        }
    }

    /// Overwrite the status of one host, leaving its siblings untouched.
    ///
    /// Unknown services and unknown hosts are logged and ignored.
    pub fn set_host_status(&self, service_name: &str, host_address: &str, status: HostStatus) {
        let mut services = self.write();

        let Some(record) = services.get_mut(service_name) else {
            warn!(
                "directory: status update for unknown service ignored, service={}, host={}",
                service_name, host_address
            );
            return;
        };

        let port = record.port;
        let mut matched = false;
        for host in record.hosts.iter_mut().filter(|h| h.address == host_address) {
            matched = true;
            if host.status != status {
                info!(
                    "directory: host status changed, service={}, host={}:{}, from={}, to={}",
                    service_name, host_address, port, host.status, status
                );
            }
            host.status = status;
        }

        if !matched {
            warn!(
                "directory: status update for unknown host ignored, service={}, host={}",
                service_name, host_address
            );
            return;
        }

        debug!(
            "directory: host status updated, service={}, host={}:{}, status={}",
            service_name, host_address, port, status
        );
    }

    pub fn get_by_name(&self, service_name: &str) -> Option<ServiceRecord> {
        self.read().get(service_name).cloned()
    }

    /// Point-in-time copy of every record, ordered by service name.
    pub fn get_all(&self) -> Vec<ServiceRecord> {
        let mut all: Vec<ServiceRecord> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Writers only store whole fields, so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ServiceRecord>> {
        self.services.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ServiceRecord>> {
        self.services.write().unwrap_or_else(PoisonError::into_inner)
    }
}
