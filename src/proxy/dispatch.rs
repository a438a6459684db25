use super::access::{AccessGate, RouteAccess};
use crate::discovery::{RoutingSnapshot, SnapshotStore};
use crate::error::RelayError;
use crate::upstream::select_active_host;
use http::Uri;

/// Split a request path into `(service, upstream_route)`.
///
/// Empty segments are dropped, so repeated and trailing slashes are ignored.
/// The first remaining segment names the service; the rest, re-joined with
/// `/`, is the upstream route (`"/"` when nothing remains). Returns `None`
/// when the path has no segment at all.
pub fn split_target(path: &str) -> Option<(&str, String)> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let service = segments.next()?;

    let mut route = String::with_capacity(path.len());
    for seg in segments {
        route.push('/');
        route.push_str(seg);
    }
    if route.is_empty() {
        route.push('/');
    }
    Some((service, route))
}

/// Outcome of a successful dispatch decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub service: String,
    pub upstream_route: String,
    /// `host:port` of the chosen backend.
    pub upstream_addr: String,
    /// Full rewritten target, query string preserved.
    pub target: Uri,
    pub access: RouteAccess,
}

/// A dispatch that ended locally. `upstream_addr` is set when a backend had
/// already been chosen, i.e. the access gate refused the request.
#[derive(Debug)]
pub struct Rejection {
    pub error: RelayError,
    pub upstream_addr: Option<String>,
}

impl From<RelayError> for Rejection {
    fn from(error: RelayError) -> Self {
        Self {
            error,
            upstream_addr: None,
        }
    }
}

/// Resolves inbound requests against the routing snapshot: picks a healthy
/// host, rewrites the target, and applies the access gate.
pub struct Dispatcher {
    snapshots: SnapshotStore,
    gate: AccessGate,
    scheme: String,
}

impl Dispatcher {
    pub fn new(snapshots: SnapshotStore, gate: AccessGate, scheme: impl Into<String>) -> Self {
        Self {
            snapshots,
            gate,
            scheme: scheme.into(),
        }
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Resolve against the current snapshot. The snapshot is loaded once, so
    /// a concurrent swap cannot affect this decision.
    pub fn resolve(&self, uri: &Uri, credential: Option<&str>) -> Result<Dispatch, Rejection> {
        let snapshot = self.snapshots.load();
        self.resolve_in(&snapshot, uri, credential)
    }

    pub fn resolve_in(
        &self,
        snapshot: &RoutingSnapshot,
        uri: &Uri,
        credential: Option<&str>,
    ) -> Result<Dispatch, Rejection> {
        let Some((service, upstream_route)) = split_target(uri.path()) else {
            return Err(RelayError::UnknownService(String::new()).into());
        };

        let record = snapshot
            .get(service)
            .ok_or_else(|| RelayError::UnknownService(service.to_string()))?;

        let host = select_active_host(record)
            .ok_or_else(|| RelayError::NoActiveHosts(service.to_string()))?;
        let upstream_addr = host.authority(record.port);

        let mut target = String::with_capacity(
            self.scheme.len() + 3 + upstream_addr.len() + upstream_route.len(),
        );
        target.push_str(&self.scheme);
        target.push_str("://");
        target.push_str(&upstream_addr);
        target.push_str(&upstream_route);
        if let Some(q) = uri.query() {
            target.push('?');
            target.push_str(q);
        }
        let target: Uri = target.parse().map_err(|e| {
            RelayError::Internal(format!("invalid upstream target {}: {}", target, e))
        })?;

        let access = match self.gate.check(&upstream_route, credential) {
            Ok(access) => access,
            Err(error) => {
                return Err(Rejection {
                    error,
                    upstream_addr: Some(upstream_addr),
                });
            }
        };

        Ok(Dispatch {
            service: service.to_string(),
            upstream_route,
            upstream_addr,
            target,
            access,
        })
    }
}
