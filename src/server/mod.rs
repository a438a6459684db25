mod admin;
pub mod bootstrap;
pub mod runtime;
mod state;

pub use state::{DirectoryState, GatewayState, UpstreamClient};

use crate::discovery;
use crate::proxy;
use anyhow::{Context, Result};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn bind(listen: &str) -> Result<TcpListener> {
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid listen address {}", listen))?;
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))
}

/// Serve the discovery API (`/discover`, `/service`, `/health`, `/metrics`)
/// until `shutdown` is notified.
pub async fn run_directory_server(
    listener: TcpListener,
    state: DirectoryState,
    shutdown: Arc<Notify>,
) -> Result<()> {
    info!("server: directory listening, addr={}", listener.local_addr()?);

    loop {
        let (stream, peer_addr) = tokio::select! {
            result = listener.accept() => match result {
                Ok(v) => v,
                Err(e) => {
                    error!("server: directory: accept failed, error={}", e);
                    continue;
                }
            },
            _ = shutdown.notified() => {
                info!("server: directory: stop accepting new connections");
                return Ok(());
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let svc = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move {
                    Ok::<_, hyper::Error>(discovery::handle_discovery(
                        &req,
                        &state.directory,
                        state.metrics.as_ref(),
                    ))
                }
            });

            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .http1()
                .keep_alive(true)
                .serve_connection(io, svc)
                .await
            {
                if !e.to_string().contains("connection closed") {
                    error!(
                        "server: directory: connection error, peer={}, error={}",
                        peer_addr, e
                    );
                }
            }
        });
    }
}

/// Run the dispatcher listener.
///
/// When `shutdown` is notified the server stops accepting new connections and
/// waits up to `DRAIN_TIMEOUT` for open connections to finish.
pub async fn run_proxy_server(
    listener: TcpListener,
    state: GatewayState,
    shutdown: Arc<Notify>,
) -> Result<()> {
    info!("server: proxy listening, addr={}", listener.local_addr()?);

    // metrics gauges are write-only, so the drain loop reads this instead.
    let active_conns = Arc::new(AtomicI64::new(0));

    loop {
        let accepted = tokio::select! {
            result = listener.accept() => result,
            _ = shutdown.notified() => {
                info!("server: proxy: stop accepting new connections, draining...");
                break;
            }
        };

        let (stream, peer_addr) = match accepted {
            Ok(v) => {
                metrics::counter!("relay_connections_total", "status" => "accepted").increment(1);
                v
            }
            Err(e) => {
                error!("server: proxy: accept failed, error={}", e);
                metrics::counter!("relay_connections_total", "status" => "error").increment(1);
                continue;
            }
        };

        metrics::gauge!("relay_connections_active").increment(1.0);
        active_conns.fetch_add(1, Ordering::Relaxed);

        let state = state.clone();
        let active_conns = active_conns.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let svc = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move { proxy::handle_request(req, state, peer_addr).await }
            });

            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .http1()
                .keep_alive(true)
                .http2()
                .keep_alive_interval(Some(Duration::from_secs(20)))
                .serve_connection(io, svc)
                .await
            {
                if !e.to_string().contains("connection closed") {
                    error!(
                        "server: proxy: connection error, peer={}, error={}",
                        peer_addr, e
                    );
                }
            }

            metrics::gauge!("relay_connections_active").decrement(1.0);
            active_conns.fetch_sub(1, Ordering::Relaxed);
        });
    }

    let active = active_conns.load(Ordering::Relaxed);
    if active > 0 {
        info!("server: proxy: waiting for {} active connections to drain", active);
        let drain = async {
            while active_conns.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        match tokio::time::timeout(DRAIN_TIMEOUT, drain).await {
            Ok(_) => info!("server: proxy: all connections drained"),
            Err(_) => info!(
                "server: proxy: drain timeout ({}s), {} connections still active",
                DRAIN_TIMEOUT.as_secs(),
                active_conns.load(Ordering::Relaxed)
            ),
        }
    }

    Ok(())
}

/// Gateway admin listener: `/health`, `/ready`, `/metrics`, `/snapshot`.
pub async fn run_admin_server(
    listener: TcpListener,
    state: GatewayState,
    shutdown: Arc<Notify>,
) -> Result<()> {
    info!("server: admin listening, addr={}", listener.local_addr()?);

    loop {
        let (stream, _) = tokio::select! {
            result = listener.accept() => result?,
            _ = shutdown.notified() => return Ok(()),
        };
        let state = state.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let svc = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move { Ok::<_, hyper::Error>(admin::handle_admin(&req, &state)) }
            });

            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .http1()
                .keep_alive(true)
                .serve_connection(io, svc)
                .await
            {
                if !e.to_string().contains("connection closed") {
                    error!("server: admin: connection error, error={}", e);
                }
            }
        });
    }
}
