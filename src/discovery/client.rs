use crate::directory::ServiceRecord;
use crate::error::RelayError;
use std::time::Duration;

/// HTTP client for the directory's discovery endpoints.
#[derive(Clone)]
pub struct DiscoveryClient {
    base_url: String,
    client: reqwest::Client,
}

impl DiscoveryClient {
    pub fn new(address: &str, timeout: Duration) -> Result<Self, RelayError> {
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", address.trim_end_matches('/'))
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .no_proxy()
            .build()?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch every service record known to the directory.
    pub async fn fetch_services(&self) -> Result<Vec<ServiceRecord>, RelayError> {
        let url = format!("{}/discover", self.base_url);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(RelayError::Discovery(format!(
                "non-success response: status={}",
                resp.status()
            )));
        }

        decode_records(&resp.bytes().await?)
    }

    /// Fetch the records registered under `name`.
    pub async fn fetch_service(&self, name: &str) -> Result<Vec<ServiceRecord>, RelayError> {
        let url = format!("{}/service", self.base_url);
        let resp = self.client.get(&url).query(&[("id", name)]).send().await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RelayError::UnknownService(name.to_string()));
        }
        if !resp.status().is_success() {
            return Err(RelayError::Discovery(format!(
                "non-success response: status={}",
                resp.status()
            )));
        }

        decode_records(&resp.bytes().await?)
    }
}

/// A `null` body is an empty directory, not an error.
fn decode_records(body: &[u8]) -> Result<Vec<ServiceRecord>, RelayError> {
    let records: Option<Vec<ServiceRecord>> = serde_json::from_slice(body)?;
    Ok(records.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        let t = Duration::from_secs(1);
        assert_eq!(
            DiscoveryClient::new("registry:8081", t).unwrap().base_url(),
            "http://registry:8081"
        );
        assert_eq!(
            DiscoveryClient::new("http://registry:8081/", t).unwrap().base_url(),
            "http://registry:8081"
        );
        assert_eq!(
            DiscoveryClient::new("https://registry", t).unwrap().base_url(),
            "https://registry"
        );
    }

    #[test]
    fn test_decode_null_body() {
        assert!(decode_records(b"null").unwrap().is_empty());
    }

    #[test]
    fn test_decode_invalid_body() {
        assert!(matches!(
            decode_records(b"<html>"),
            Err(RelayError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_records() {
        let body = br#"[{"id":"svcA","hosts":[{"IP":"10.0.0.1","Status":"active"}],"port":7777}]"#;
        let records = decode_records(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "svcA");
        assert_eq!(records[0].port, 7777);
        assert!(records[0].hosts[0].status.is_active());
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_http_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = DiscoveryClient::new(&addr.to_string(), Duration::from_millis(500)).unwrap();
        assert!(matches!(
            client.fetch_services().await,
            Err(RelayError::Http(_))
        ));
    }
}
