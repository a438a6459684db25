use http::StatusCode;
use std::fmt;

#[derive(Debug)]
pub enum RelayError {
    UnknownService(String),
    NoActiveHosts(String),
    Unauthorized,
    UpstreamTimeout,
    UpstreamConnect(String),
    Http(reqwest::Error),
    Decode(serde_json::Error),
    Discovery(String),
    Internal(String),
}

impl RelayError {
    /// Status code returned to the downstream client when this error ends a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::UnknownService(_) | RelayError::NoActiveHosts(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            RelayError::UpstreamConnect(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::UnknownService(name) => write!(f, "no such service available: {}", name),
            RelayError::NoActiveHosts(name) => {
                write!(f, "no active hosts in service {} available", name)
            }
            RelayError::Unauthorized => write!(f, "not authorized"),
            RelayError::UpstreamTimeout => write!(f, "upstream timeout"),
            RelayError::UpstreamConnect(msg) => write!(f, "upstream connect error: {}", msg),
            RelayError::Http(e) => write!(f, "http error: {}", e),
            RelayError::Decode(e) => write!(f, "decode error: {}", e),
            RelayError::Discovery(msg) => write!(f, "discovery error: {}", msg),
            RelayError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Http(e) => Some(e),
            RelayError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::Http(e)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Decode(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_service() {
        assert_eq!(
            RelayError::UnknownService("svcA".to_string()).to_string(),
            "no such service available: svcA"
        );
    }

    #[test]
    fn display_no_active_hosts() {
        assert_eq!(
            RelayError::NoActiveHosts("svcA".to_string()).to_string(),
            "no active hosts in service svcA available"
        );
    }

    #[test]
    fn display_unauthorized() {
        assert_eq!(RelayError::Unauthorized.to_string(), "not authorized");
    }

    #[test]
    fn display_discovery() {
        assert_eq!(
            RelayError::Discovery("status=500".to_string()).to_string(),
            "discovery error: status=500"
        );
    }

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            RelayError::UnknownService("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RelayError::NoActiveHosts("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(RelayError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            RelayError::UpstreamTimeout.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            RelayError::UpstreamConnect("refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RelayError::Internal("bad".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn decode_error_has_source() {
        let err: RelayError = serde_json::from_str::<Vec<u32>>("{")
            .unwrap_err()
            .into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
