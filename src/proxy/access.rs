use crate::config::AccessConfig;
use crate::error::RelayError;
use std::collections::HashSet;
use std::sync::Arc;

/// Decides whether a presented credential is acceptable.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credential: &str) -> bool;
}

/// Accepts exactly one fixed token. A placeholder until real credential
/// infrastructure (signed tokens, mTLS) is wired in through the trait.
pub struct StaticTokenVerifier {
    token: String,
}

impl StaticTokenVerifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CredentialVerifier for StaticTokenVerifier {
    fn verify(&self, credential: &str) -> bool {
        !credential.is_empty() && credential == self.token
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Private,
}

impl RouteAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteAccess::Public => "public",
            RouteAccess::Private => "private",
        }
    }
}

/// Public/private classification of upstream routes plus the credential check
/// applied to private ones.
pub struct AccessGate {
    public_routes: HashSet<String>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl AccessGate {
    pub fn new<I, S>(public_routes: I, verifier: Arc<dyn CredentialVerifier>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            public_routes: public_routes.into_iter().map(Into::into).collect(),
            verifier,
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(
            config.public_routes.iter().cloned(),
            Arc::new(StaticTokenVerifier::new(config.token.clone())),
        )
    }

    /// Exact match against the public route list; everything else is private.
    pub fn classify(&self, upstream_route: &str) -> RouteAccess {
        if self.public_routes.contains(upstream_route) {
            RouteAccess::Public
        } else {
            RouteAccess::Private
        }
    }

    /// Admit or reject a request for `upstream_route` carrying `credential`
    /// (the raw `Authorization` header value, if any).
    pub fn check(
        &self,
        upstream_route: &str,
        credential: Option<&str>,
    ) -> Result<RouteAccess, RelayError> {
        match self.classify(upstream_route) {
            RouteAccess::Public => Ok(RouteAccess::Public),
            RouteAccess::Private => match credential {
                Some(c) if self.verifier.verify(c) => Ok(RouteAccess::Private),
                _ => Err(RelayError::Unauthorized),
            },
        }
    }
}
