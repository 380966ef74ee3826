//! Origin normalization for the client registry.
//!
//! An origin is the `(scheme, host, port)` triple of an absolute URL. The
//! port is always concrete: an implicit port resolves to the scheme default,
//! so `https://host/a` and `https://host:443/b` share one origin.

use super::HttpClientError;
use reqwest::Url;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
    port: u16,
    // `url` drops default ports on parse, so this is a pure function of the
    // three fields above.
    base: Url,
}

impl Origin {
    /// Parse an absolute URL string and extract its origin.
    pub fn parse(url: &str) -> Result<Self, HttpClientError> {
        let parsed = Url::parse(url).map_err(|e| HttpClientError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_url(&parsed)
    }

    /// Extract the origin of an already parsed URL.
    pub fn from_url(url: &Url) -> Result<Self, HttpClientError> {
        let invalid = |reason: &str| HttpClientError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(invalid("only http and https are supported"));
        }

        let host = match url.host() {
            Some(host) => host.to_string(),
            None => return Err(invalid("missing host")),
        };

        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        let mut base = url.clone();
        base.set_path("/");
        base.set_query(None);
        base.set_fragment(None);
        // credentials never become part of the registry key
        let _ = base.set_username("");
        let _ = base.set_password(None);

        Ok(Self {
            scheme: scheme.to_string(),
            host,
            port,
            base,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The origin as a URL with an empty path.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve the path and query of `url` against this origin.
    pub fn join(&self, url: &Url) -> Url {
        let mut target = self.base.clone();
        target.set_path(url.path());
        target.set_query(url.query());
        target
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Path plus query of `url`, used for request logging.
pub fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
