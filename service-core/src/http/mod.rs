//! Outbound HTTP client layer.
//!
//! [`ClientRegistry`] maps origins to [`PooledClient`]s so each downstream
//! origin is served by exactly one connection pool.
//!
//! ```ignore
//! let registry = Arc::new(ClientRegistry::new(ClientOptions::default()));
//! let url = Url::parse("http://neuron:8000/agent/run")?;
//! let client = registry.get_client(url.as_str(), None).await?;
//! let story = client
//!     .post(&url, &json!({"prompt": "..."}), None, ResponseFormat::Json)
//!     .await?;
//! ```

pub mod client;
pub mod error;
pub mod origin;
pub mod registry;

pub use client::{ClientOptions, Payload, PooledClient, ResponseFormat};
pub use error::HttpClientError;
pub use origin::Origin;
pub use registry::ClientRegistry;
pub use reqwest::Url;
pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
