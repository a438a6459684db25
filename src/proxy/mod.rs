pub mod access;
pub mod context;
pub mod dispatch;
mod handler;

pub use access::{AccessGate, CredentialVerifier, RouteAccess, StaticTokenVerifier};
pub use context::BoxBody;
pub use dispatch::{split_target, Dispatch, Dispatcher, Rejection};
pub use handler::handle_request;
