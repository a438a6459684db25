use crate::directory::{HostEntry, ServiceRecord};
use rand::Rng;

/// Pick one element uniformly at random. No per-call state is kept, so two
/// consecutive calls may return the same element.
pub fn select_random<T>(candidates: &[T]) -> Option<&T> {
    if candidates.is_empty() {
        return None;
    }
    let idx = rand::thread_rng().gen_range(0..candidates.len());
    Some(&candidates[idx])
}

/// Pick one active host of `record`, or `None` when no host is active.
pub fn select_active_host(record: &ServiceRecord) -> Option<&HostEntry> {
    let active: Vec<&HostEntry> = record.active_hosts().collect();
    select_random(&active).copied()
}
