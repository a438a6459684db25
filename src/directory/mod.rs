pub mod store;
pub mod types;

pub use store::ServiceDirectory;
pub use types::{HostEntry, HostStatus, ServiceRecord};
