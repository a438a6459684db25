use crate::config::GatewayConfig;
use crate::directory::ServiceDirectory;
use crate::discovery::SnapshotStore;
use crate::metrics::Metrics;
use crate::proxy::{AccessGate, BoxBody, Dispatcher};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;

pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, BoxBody>;

/// Shared state of the directory process.
#[derive(Clone)]
pub struct DirectoryState {
    pub directory: ServiceDirectory,
    pub metrics: Option<Metrics>,
}

impl DirectoryState {
    pub fn new(directory: ServiceDirectory, metrics: Option<Metrics>) -> Self {
        Self { directory, metrics }
    }
}

/// Shared gateway state, cheaply cloneable.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub dispatcher: Arc<Dispatcher>,
    pub client: UpstreamClient,
    pub metrics: Option<Metrics>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, snapshots: SnapshotStore, metrics: Option<Metrics>) -> Self {
        let gate = AccessGate::from_config(&config.access);
        let dispatcher = Dispatcher::new(snapshots, gate, config.upstream.scheme.clone());
        let client = build_upstream_client(config.upstream.timeout());

        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            client,
            metrics,
        }
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        self.dispatcher.snapshots()
    }
}

fn build_upstream_client(connect_timeout: Duration) -> UpstreamClient {
    let mut http = HttpConnector::new();
    http.set_nodelay(true);
    http.set_connect_timeout(Some(connect_timeout));
    http.enforce_http(false);

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(90))
        .build(https)
}
