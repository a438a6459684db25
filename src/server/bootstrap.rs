use crate::config::{DirectoryConfig, GatewayConfig, HealthCheckConfig};
use crate::directory::ServiceDirectory;
use crate::discovery::{self, DiscoveryClient, SnapshotStore};
use crate::metrics::Metrics;
use crate::server::{self, DirectoryState, GatewayState};
use crate::upstream::{self, HealthProber};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// CLI arguments of `relay-directory`.
pub struct DirectoryArgs {
    pub config_path: PathBuf,
    pub listen: Option<String>,
    pub polling_rate: Option<Duration>,
}

/// CLI arguments of `relay-gateway`.
pub struct GatewayArgs {
    pub config_path: PathBuf,
    pub listen: Option<String>,
    pub admin_listen: Option<String>,
    pub polling_rate: Option<Duration>,
}

/// Directory lifecycle: load → register → probe → serve → shutdown.
pub async fn run_directory(args: DirectoryArgs) -> Result<()> {
    init_tracing();

    let mut config = DirectoryConfig::load(&args.config_path)?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(rate) = args.polling_rate {
        config.health_check.interval_ms = rate.as_millis() as u64;
        config.validate()?;
    }

    let metrics = install_metrics();
    let directory = ServiceDirectory::new();
    directory.register(config.services.clone());
    tracing::info!(
        "directory: static services registered, services={}",
        directory.len()
    );

    let listener = server::bind(&config.listen).await?;
    let shutdown = Arc::new(Notify::new());

    start_health_check_loop(directory.clone(), config.health_check.clone(), &shutdown)?;

    let server_handle = tokio::spawn(server::run_directory_server(
        listener,
        DirectoryState::new(directory, metrics),
        shutdown.clone(),
    ));

    wait_for_shutdown(&shutdown).await;

    match server_handle.await {
        Ok(Err(e)) => tracing::error!("server: directory failed, error={}", e),
        Err(e) => tracing::error!("server: directory task error: {}", e),
        Ok(Ok(())) => {}
    }
    tracing::info!("server: shutdown complete");
    Ok(())
}

/// Gateway lifecycle: load → admin → initial discovery → poll → serve → shutdown.
pub async fn run_gateway(args: GatewayArgs) -> Result<()> {
    init_tracing();

    let mut config = GatewayConfig::load(&args.config_path)?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(admin_listen) = args.admin_listen {
        config.admin_listen = admin_listen;
    }
    if let Some(rate) = args.polling_rate {
        config.discovery.poll_interval_ms = rate.as_millis() as u64;
        config.validate()?;
    }

    let metrics = install_metrics();
    let client = DiscoveryClient::new(&config.discovery.address, config.discovery.timeout())?;
    let snapshots = SnapshotStore::new();
    let state = GatewayState::new(config.clone(), snapshots.clone(), metrics);
    let shutdown = Arc::new(Notify::new());

    let signal_handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { wait_for_shutdown(&shutdown).await }
    });

    // Admin first so `/ready` reports 503 while the initial fetch is pending.
    let admin_listener = server::bind(&config.admin_listen).await?;
    start_admin_server(admin_listener, &state, &shutdown);

    let poll_interval = config.discovery.poll_interval();
    if !initial_discovery(&client, &snapshots, poll_interval, &shutdown).await {
        tracing::info!("server: shutdown before initial discovery completed");
        return Ok(());
    }
    start_discovery_loop(client, snapshots, poll_interval, &shutdown);

    let proxy_listener = server::bind(&config.listen).await?;
    tracing::info!("server: starting gateway, listen={}", config.listen);
    let proxy_handle = tokio::spawn(server::run_proxy_server(
        proxy_listener,
        state,
        shutdown.clone(),
    ));

    if let Err(e) = signal_handle.await {
        tracing::error!("server: signal task error: {}", e);
    }

    match proxy_handle.await {
        Ok(Err(e)) => tracing::error!("server: proxy failed, error={}", e),
        Err(e) => tracing::error!("server: proxy task error: {}", e),
        Ok(Ok(())) => {}
    }
    tracing::info!("server: shutdown complete");
    Ok(())
}

fn init_tracing() {
    let (non_blocking, guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .buffered_lines_limit(128_000)
        .lossy(true)
        .finish(std::io::stdout());

    let installed = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .json(),
        )
        .try_init();

    // The writer must outlive every log call, i.e. the whole process.
    if installed.is_ok() {
        std::mem::forget(guard);
    }
}

fn install_metrics() -> Option<Metrics> {
    match Metrics::install() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!("metrics: recorder install failed, error={}", e);
            None
        }
    }
}

/// Sleep for `duration`, but return `true` immediately if shutdown is signalled.
/// Returns `false` if the full duration elapsed normally.
async fn sleep_or_shutdown(duration: Duration, shutdown: &Notify) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.notified() => true,
    }
}

/// Probe every host once per interval until shutdown. The first cycle runs
/// immediately so statuses leave `Unknown` as soon as possible.
pub fn start_health_check_loop(
    directory: ServiceDirectory,
    config: HealthCheckConfig,
    shutdown: &Arc<Notify>,
) -> Result<()> {
    let client = upstream::build_health_check_client(config.timeout())?;
    let prober = HealthProber::new(directory, config, client);
    let shutdown = shutdown.clone();

    tracing::info!(
        "health: prober started, interval={:?}",
        prober.interval()
    );

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = prober.run_health_checks() => {}
                _ = shutdown.notified() => return,
            }
            if sleep_or_shutdown(prober.interval(), &shutdown).await {
                return;
            }
        }
    });
    Ok(())
}

/// Retry the first fetch every `interval` until it succeeds. Returns `false`
/// if shutdown arrived first.
pub async fn initial_discovery(
    client: &DiscoveryClient,
    snapshots: &SnapshotStore,
    interval: Duration,
    shutdown: &Notify,
) -> bool {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let result = tokio::select! {
            r = discovery::poll_once(client, snapshots) => r,
            _ = shutdown.notified() => return false,
        };
        if let Ok(services) = result {
            tracing::info!(
                "discovery: initial fetch completed, services={}, attempts={}",
                services,
                attempts
            );
            return true;
        }
        if sleep_or_shutdown(interval, shutdown).await {
            return false;
        }
    }
}

/// Refresh the routing snapshot every `interval`. A failed poll keeps the
/// previous snapshot; the next tick retries.
pub fn start_discovery_loop(
    client: DiscoveryClient,
    snapshots: SnapshotStore,
    interval: Duration,
    shutdown: &Arc<Notify>,
) {
    let shutdown = shutdown.clone();

    tokio::spawn(async move {
        loop {
            if sleep_or_shutdown(interval, &shutdown).await {
                return;
            }
            // Failures are already logged and counted.
            let _ = discovery::poll_once(&client, &snapshots).await;
        }
    });
}

fn start_admin_server(
    listener: tokio::net::TcpListener,
    state: &GatewayState,
    shutdown: &Arc<Notify>,
) {
    let state = state.clone();
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = server::run_admin_server(listener, state, shutdown).await {
            tracing::error!("server: admin failed, error={}", e);
        }
    });
}

async fn wait_for_shutdown(shutdown: &Arc<Notify>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("server: SIGTERM handler install failed, error={}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("server: received SIGINT, shutting down"),
        _ = terminate => tracing::info!("server: received SIGTERM, shutting down"),
    }

    shutdown.notify_waiters();
}
