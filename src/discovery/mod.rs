pub mod client;
pub mod publisher;
pub mod snapshot;

pub use client::DiscoveryClient;
pub use publisher::handle_discovery;
pub use snapshot::{poll_once, RoutingSnapshot, SnapshotStore};
