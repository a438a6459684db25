//! Worker-thread sizing for the tokio runtime.
//!
//! Inside a container the host CPU count over-provisions threads, so the
//! cgroup quota is consulted before falling back to `available_parallelism`.

use std::io;

/// Where the worker count came from, reported once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuSource {
    Env,
    CgroupV2,
    CgroupV1,
    Host,
}

/// Resolve the worker count: `RELAY_WORKER_THREADS` ("4" or "4000m"), then
/// cgroup v2 `cpu.max`, then cgroup v1 quota/period, then the host count.
pub fn worker_threads() -> (usize, CpuSource) {
    if let Some(n) = std::env::var("RELAY_WORKER_THREADS")
        .ok()
        .and_then(|v| parse_cpu_value(&v))
    {
        return (n.max(1), CpuSource::Env);
    }

    if let Some(n) = std::fs::read_to_string("/sys/fs/cgroup/cpu.max")
        .ok()
        .and_then(|c| parse_cgroup_v2_cpu(&c))
    {
        return (n.max(1), CpuSource::CgroupV2);
    }

    let quota = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_quota_us");
    let period = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_period_us");
    if let (Ok(q), Ok(p)) = (quota, period) {
        if let Some(n) = quota_to_cores(q.trim(), p.trim()) {
            return (n.max(1), CpuSource::CgroupV1);
        }
    }

    let host = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    (host, CpuSource::Host)
}

/// Build the multi-threaded runtime shared by both binaries.
pub fn build(thread_name: &str) -> io::Result<tokio::runtime::Runtime> {
    let (threads, source) = worker_threads();
    // Tracing is not initialised yet.
    eprintln!("[runtime] {} worker threads ({:?})", threads, source);

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .thread_name(thread_name)
        .enable_all()
        .build()
}

fn parse_cpu_value(value: &str) -> Option<usize> {
    let value = value.trim();
    match value.strip_suffix('m') {
        Some(milli) => milli.parse::<usize>().ok().map(|m| m / 1000),
        None => value.parse().ok(),
    }
}

/// `cpu.max` holds "<quota> <period>", or "max <period>" when unlimited.
fn parse_cgroup_v2_cpu(content: &str) -> Option<usize> {
    let mut parts = content.split_whitespace();
    let quota = parts.next()?;
    let period = parts.next()?;
    if quota == "max" {
        return None;
    }
    quota_to_cores(quota, period)
}

fn quota_to_cores(quota: &str, period: &str) -> Option<usize> {
    let quota: i64 = quota.parse().ok()?;
    let period: i64 = period.parse().ok()?;
    (quota > 0 && period > 0).then(|| (quota / period) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_value() {
        assert_eq!(parse_cpu_value("4"), Some(4));
        assert_eq!(parse_cpu_value(" 8 "), Some(8));
        assert_eq!(parse_cpu_value("2000m"), Some(2));
        // rounds down, callers clamp to 1
        assert_eq!(parse_cpu_value("500m"), Some(0));
        assert_eq!(parse_cpu_value("four"), None);
    }

    #[test]
    fn test_parse_cgroup_v2_cpu() {
        assert_eq!(parse_cgroup_v2_cpu("400000 100000\n"), Some(4));
        assert_eq!(parse_cgroup_v2_cpu("max 100000"), None);
        assert_eq!(parse_cgroup_v2_cpu("100000"), None);
    }

    #[test]
    fn test_quota_to_cores() {
        assert_eq!(quota_to_cores("200000", "100000"), Some(2));
        assert_eq!(quota_to_cores("-1", "100000"), None);
        assert_eq!(quota_to_cores("0", "100000"), None);
    }

    #[test]
    fn test_worker_threads_at_least_one() {
        let (threads, _) = worker_threads();
        assert!(threads >= 1);
    }
}
