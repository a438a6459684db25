use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use std::net::IpAddr;
use std::time::Instant;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Per-request bookkeeping for logging and metrics.
pub struct RequestContext {
    pub method: String,
    pub uri_path: String,
    pub service: String,
    pub upstream_route: String,
    pub upstream_addr: String,
    pub client_ip: IpAddr,
    pub start: Instant,
    pub upstream_start: Option<Instant>,
}

impl RequestContext {
    pub fn new(method: String, uri_path: String, client_ip: IpAddr) -> Self {
        Self {
            method,
            uri_path,
            service: String::new(),
            upstream_route: String::new(),
            upstream_addr: String::new(),
            client_ip,
            start: Instant::now(),
            upstream_start: None,
        }
    }

    /// Build a JSON error response and record it as the request's outcome.
    pub fn error_response(&self, status: StatusCode, msg: &str) -> hyper::Response<BoxBody> {
        self.finalize_metrics(status.as_u16());

        let body = serde_json::json!({ "error": msg }).to_string();
        let mut resp = hyper::Response::new(full_body(body));
        *resp.status_mut() = status;
        resp.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        resp
    }

    pub fn finalize_metrics(&self, resp_status: u16) {
        let mut buf = itoa::Buffer::new();
        let status_str = buf.format(resp_status);

        metrics::counter!(
            "relay_http_requests_total",
            "service" => self.service.clone(),
            "method" => self.method.clone(),
            "status_code" => status_str.to_owned(),
        )
        .increment(1);

        metrics::histogram!(
            "relay_http_request_duration_seconds",
            "service" => self.service.clone(),
        )
        .record(self.start.elapsed().as_secs_f64());

        if let Some(upstream_start) = self.upstream_start {
            metrics::histogram!(
                "relay_upstream_request_duration_seconds",
                "service" => self.service.clone(),
                "upstream" => self.upstream_addr.clone(),
            )
            .record(upstream_start.elapsed().as_secs_f64());
        }
    }
}
