use crate::error::RelayError;
use crate::proxy::context::{BoxBody, RequestContext};
use crate::proxy::dispatch::{split_target, Rejection};
use crate::server::GatewayState;
use http::header::{AUTHORIZATION, CONNECTION, HOST, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, warn};

/// Handle one inbound request:
///
/// 1. RESOLVE: service lookup, host selection, target rewrite, access gate
/// 2. FORWARD: send to the chosen backend under the upstream timeout
/// 3. LOG: access line and metrics
pub async fn handle_request(
    req: Request<Incoming>,
    state: GatewayState,
    peer_addr: SocketAddr,
) -> Result<Response<BoxBody>, hyper::Error> {
    let (parts, body) = req.into_parts();

    let host = parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    // Left-most X-Forwarded-For entry when present, otherwise the TCP peer.
    let client_ip = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|s| s.trim().parse::<std::net::IpAddr>().ok())
        .unwrap_or_else(|| peer_addr.ip());

    let mut ctx = RequestContext::new(
        parts.method.as_str().to_string(),
        parts.uri.path().to_string(),
        client_ip,
    );

    let credential = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let dispatch = match state.dispatcher.resolve(&parts.uri, credential) {
        Ok(d) => d,
        Err(rejection) => return Ok(reject_dispatch(&mut ctx, rejection)),
    };

    ctx.service = dispatch.service;
    ctx.upstream_route = dispatch.upstream_route;
    ctx.upstream_addr = dispatch.upstream_addr;

    debug!(
        "proxy: dispatch, service={}, route={}, access={}, target={}",
        ctx.service,
        ctx.upstream_route,
        dispatch.access.as_str(),
        dispatch.target
    );

    let mut headers = parts.headers;
    remove_hop_headers(&mut headers);
    inject_forwarded_headers(&mut headers, peer_addr, &host);
    if let Ok(v) = HeaderValue::from_str(&ctx.upstream_addr) {
        headers.insert(HOST, v);
    }

    let mut upstream_req = Request::new(body.boxed());
    *upstream_req.method_mut() = parts.method;
    *upstream_req.uri_mut() = dispatch.target;
    *upstream_req.headers_mut() = headers;

    ctx.upstream_start = Some(Instant::now());
    let upstream_timeout = state.config.upstream.timeout();

    let result = tokio::time::timeout(upstream_timeout, state.client.request(upstream_req)).await;

    match result {
        Ok(Ok(resp)) => {
            let mut resp = resp.map(|b| b.boxed());
            remove_hop_headers(resp.headers_mut());
            let status = resp.status().as_u16();
            ctx.finalize_metrics(status);
            log_access(&ctx, status);
            Ok(resp)
        }
        Ok(Err(e)) => {
            warn!(
                "proxy: upstream error, service={}, upstream={}, error={}",
                ctx.service, ctx.upstream_addr, e
            );
            Ok(reject(&ctx, RelayError::UpstreamConnect(e.to_string())))
        }
        Err(_) => {
            warn!(
                "proxy: upstream timeout, service={}, upstream={}, timeout={:?}",
                ctx.service, ctx.upstream_addr, upstream_timeout
            );
            Ok(reject(&ctx, RelayError::UpstreamTimeout))
        }
    }
}

/// Fill in whatever the dispatcher got to before refusing, then reject.
fn reject_dispatch(ctx: &mut RequestContext, rejection: Rejection) -> Response<BoxBody> {
    if let Some((service, route)) = split_target(&ctx.uri_path) {
        ctx.service = service.to_string();
        ctx.upstream_route = route;
    }
    if let Some(addr) = rejection.upstream_addr {
        ctx.upstream_addr = addr;
    }
    reject(ctx, rejection.error)
}

/// Terminate the request locally with the error's status and message.
fn reject(ctx: &RequestContext, err: RelayError) -> Response<BoxBody> {
    let status = err.status_code();
    let resp = ctx.error_response(status, &err.to_string());
    log_access(ctx, status.as_u16());
    resp
}

/// One line per request, enough to map every request to its backend.
fn log_access(ctx: &RequestContext, status: u16) {
    let total_ms = ctx.start.elapsed().as_millis();
    let upstream_ms = ctx
        .upstream_start
        .map(|s| s.elapsed().as_millis())
        .unwrap_or(0);

    tracing::info!(
        client_ip = %ctx.client_ip,
        method = %ctx.method,
        path = %ctx.uri_path,
        service = %ctx.service,
        route = %ctx.upstream_route,
        upstream = %ctx.upstream_addr,
        status = status,
        latency_ms = %total_ms,
        upstream_ms = %upstream_ms,
        "access"
    );
}

fn remove_hop_headers(headers: &mut HeaderMap) {
    let hop_headers: [HeaderName; 8] = [
        CONNECTION,
        HeaderName::from_static("keep-alive"),
        HeaderName::from_static("proxy-authenticate"),
        HeaderName::from_static("proxy-authorization"),
        HeaderName::from_static("te"),
        HeaderName::from_static("trailers"),
        TRANSFER_ENCODING,
        HeaderName::from_static("upgrade"),
    ];

    for h in &hop_headers {
        headers.remove(h);
    }
}

/// Append the peer to `X-Forwarded-For`, default `X-Forwarded-Proto` to
/// `http`, record the original `Host` in `X-Forwarded-Host`, and overwrite
/// `X-Real-IP` with the immediate peer.
fn inject_forwarded_headers(headers: &mut HeaderMap, peer_addr: SocketAddr, original_host: &str) {
    static XFF: HeaderName = HeaderName::from_static("x-forwarded-for");
    static XFP: HeaderName = HeaderName::from_static("x-forwarded-proto");
    static XFH: HeaderName = HeaderName::from_static("x-forwarded-host");
    static XRI: HeaderName = HeaderName::from_static("x-real-ip");

    let peer_ip = peer_addr.ip().to_string();

    let forwarded_for = match headers.get(&XFF).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{}, {}", existing, peer_ip),
        None => peer_ip.clone(),
    };
    if let Ok(v) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(XFF.clone(), v);
    }

    if !headers.contains_key(&XFP) {
        headers.insert(XFP.clone(), HeaderValue::from_static("http"));
    }

    if !original_host.is_empty() {
        if let Ok(v) = HeaderValue::from_str(original_host) {
            headers.insert(XFH.clone(), v);
        }
    }

    if let Ok(v) = HeaderValue::from_str(&peer_ip) {
        headers.insert(XRI.clone(), v);
    }
}
