pub mod config;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod proxy;
pub mod server;
pub mod upstream;
