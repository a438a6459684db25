use crate::directory::{ServiceDirectory, ServiceRecord};
use crate::metrics::Metrics;
use crate::proxy::context::{full_body, BoxBody};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};
use hyper::{Request, Response};
use tracing::debug;

/// Read-only query surface over the directory.
///
/// - `GET /discover`         → every record
/// - `GET /service?id=<name>` → matching records, 404 when none
/// - `GET /health`           → liveness
/// - `GET /metrics`          → Prometheus exposition (when a recorder is installed)
pub fn handle_discovery<B>(
    req: &Request<B>,
    directory: &ServiceDirectory,
    metrics: Option<&Metrics>,
) -> Response<BoxBody> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            r#"{"error":"method not allowed"}"#.to_string(),
        );
    }

    match req.uri().path() {
        "/discover" => records_response(&directory.get_all()),

        "/service" => {
            let id = query_param(req.uri().query(), "id").unwrap_or_default();
            match directory.get_by_name(&id) {
                Some(record) => records_response(&[record]),
                None => {
                    debug!("discovery: service not found, id={}", id);
                    let mut resp = Response::new(full_body("Service not found\n"));
                    *resp.status_mut() = StatusCode::NOT_FOUND;
                    resp
                }
            }
        }

        "/health" | "/healthz" => json_response(StatusCode::OK, r#"{"status":"ok"}"#.to_string()),

        "/metrics" => {
            let body = metrics.map(Metrics::render).unwrap_or_default();
            let mut resp = Response::new(full_body(body));
            resp.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            resp
        }

        _ => json_response(StatusCode::NOT_FOUND, r#"{"error":"not found"}"#.to_string()),
    }
}

fn records_response(records: &[ServiceRecord]) -> Response<BoxBody> {
    match serde_json::to_string(records) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(r#"{{"error":"encode failed: {}"}}"#, e),
        ),
    }
}

pub(crate) fn json_response(status: StatusCode, body: String) -> Response<BoxBody> {
    let mut resp = Response::new(full_body(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{HostEntry, HostStatus};
    use http_body_util::BodyExt;

    fn directory() -> ServiceDirectory {
        let dir = ServiceDirectory::new();
        dir.register([
            ServiceRecord::new(
                "svcA",
                vec![
                    HostEntry::with_status("10.0.0.1", HostStatus::Active),
                    HostEntry::with_status("10.0.0.2", HostStatus::Inactive),
                ],
                7777,
            ),
            ServiceRecord::new("svc b", vec![], 7778),
        ]);
        dir
    }

    fn get(uri: &str) -> Request<()> {
        Request::builder().uri(uri).body(()).unwrap()
    }

    async fn body_of(resp: Response<BoxBody>) -> Vec<u8> {
        resp.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_discover_all() {
        let dir = directory();
        let resp = handle_discovery(&get("/discover"), &dir, None);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        let records: Vec<ServiceRecord> = serde_json::from_slice(&body_of(resp).await).unwrap();
        assert_eq!(records, dir.get_all());
    }

    #[tokio::test]
    async fn test_discover_empty_is_array() {
        let resp = handle_discovery(&get("/discover"), &ServiceDirectory::new(), None);
        assert_eq!(body_of(resp).await, b"[]");
    }

    #[tokio::test]
    async fn test_service_by_name() {
        let dir = directory();
        let resp = handle_discovery(&get("/service?id=svcA"), &dir, None);
        assert_eq!(resp.status(), StatusCode::OK);
        let records: Vec<ServiceRecord> = serde_json::from_slice(&body_of(resp).await).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], dir.get_by_name("svcA").unwrap());
    }

    #[tokio::test]
    async fn test_service_by_encoded_name() {
        let dir = directory();
        let resp = handle_discovery(&get("/service?id=svc%20b"), &dir, None);
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_service_not_found() {
        let dir = directory();
        assert_eq!(
            handle_discovery(&get("/service?id=nope"), &dir, None).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            handle_discovery(&get("/service"), &dir, None).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_reflects_latest_write() {
        let dir = directory();
        dir.set_host_status("svcA", "10.0.0.2", HostStatus::Active);
        let resp = handle_discovery(&get("/service?id=svcA"), &dir, None);
        let records: Vec<ServiceRecord> = serde_json::from_slice(&body_of(resp).await).unwrap();
        assert_eq!(records[0].active_count(), 2);
    }

    #[test]
    fn test_unknown_path_and_method() {
        let dir = directory();
        assert_eq!(
            handle_discovery(&get("/nope"), &dir, None).status(),
            StatusCode::NOT_FOUND
        );
        let post = Request::builder()
            .method(Method::POST)
            .uri("/discover")
            .body(())
            .unwrap();
        assert_eq!(
            handle_discovery(&post, &dir, None).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(Some("id=a&x=1"), "id").as_deref(), Some("a"));
        assert_eq!(query_param(Some("x=1"), "id"), None);
        assert_eq!(query_param(None, "id"), None);
    }
}
