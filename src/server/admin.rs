use super::GatewayState;
use crate::discovery::publisher::json_response;
use crate::proxy::context::full_body;
use crate::proxy::BoxBody;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use hyper::{Request, Response};

pub fn handle_admin<B>(req: &Request<B>, state: &GatewayState) -> Response<BoxBody> {
    match req.uri().path() {
        "/health" | "/healthz" => json_response(StatusCode::OK, r#"{"status":"ok"}"#.to_string()),

        "/ready" | "/readyz" => {
            let snapshot = state.snapshots().load();
            if snapshot.generation() == 0 {
                return json_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    r#"{"status":"waiting for discovery"}"#.to_string(),
                );
            }
            json_response(
                StatusCode::OK,
                format!(r#"{{"status":"ready","services":{}}}"#, snapshot.len()),
            )
        }

        "/metrics" => {
            let body = state
                .metrics
                .as_ref()
                .map(|m| m.render())
                .unwrap_or_default();
            let mut resp = Response::new(full_body(body));
            resp.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            resp
        }

        "/snapshot" => {
            let snapshot = state.snapshots().load();
            let body = serde_json::json!({
                "generation": snapshot.generation(),
                "services": snapshot.records(),
            });
            match serde_json::to_string_pretty(&body) {
                Ok(body) => json_response(StatusCode::OK, body),
                Err(e) => json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": e.to_string() }).to_string(),
                ),
            }
        }

        _ => json_response(StatusCode::NOT_FOUND, r#"{"error":"not found"}"#.to_string()),
    }
}
