pub mod health;
pub mod loadbalance;

pub use health::{build_health_check_client, HealthProber};
pub use loadbalance::{select_active_host, select_random};
