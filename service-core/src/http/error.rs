use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by the pooled HTTP client layer.
///
/// Nothing in this layer retries or swallows a failure; every variant is
/// surfaced to the caller as-is.
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("Invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection refused, DNS failure, timeout, or a broken body stream.
    #[error("Transport error calling {origin}: {source}")]
    Transport {
        origin: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{origin} responded with status {status}")]
    Status {
        origin: String,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to decode response from {origin}: {reason}")]
    Decode { origin: String, reason: String },

    /// The client, or the registry that owns it, has been torn down.
    #[error("HTTP client for {target} is closed")]
    Closed { target: String },

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl HttpClientError {
    /// True when the underlying transport failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpClientError::Transport { source, .. } if source.is_timeout())
    }

    /// Status code for `Status` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, HttpClientError::Closed { .. })
    }
}
