//! Per-origin cache of pooled HTTP clients.
//!
//! One registry is built at startup and shared through application state.
//! It hands out at most one [`PooledClient`] per origin for its whole
//! lifetime, and tears all of them down together on shutdown.

use super::{ClientOptions, HttpClientError, Origin, PooledClient};
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct RegistryState {
    clients: HashMap<Origin, Arc<PooledClient>>,
    closed: bool,
}

pub struct ClientRegistry {
    options: ClientOptions,
    state: Mutex<RegistryState>,
}

impl ClientRegistry {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Return the client for `url`'s origin, creating it on first use.
    ///
    /// `headers` only take effect when this call creates the client. On a hit
    /// the existing client is returned unchanged and the headers are dropped;
    /// use [`update_headers`](Self::update_headers) to change them.
    pub async fn get_client(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
    ) -> Result<Arc<PooledClient>, HttpClientError> {
        let origin = Origin::parse(url)?;
        tracing::debug!(origin = %origin, "Looking up HTTP client");

        let mut state = self.state.lock().await;
        if state.closed {
            return Err(registry_closed());
        }

        if let Some(client) = state.clients.get(&origin) {
            if headers.is_some() {
                tracing::debug!(
                    origin = %origin,
                    "Client already exists, ignoring headers passed to get_client"
                );
            }
            return Ok(Arc::clone(client));
        }

        tracing::debug!(origin = %origin, "Creating new HTTP client");
        let client = Arc::new(PooledClient::new(origin.clone(), headers, &self.options)?);
        state.clients.insert(origin, Arc::clone(&client));
        Ok(client)
    }

    /// Replace the default headers of the client for `url`'s origin,
    /// creating the client with those headers if none exists yet.
    pub async fn update_headers(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<Arc<PooledClient>, HttpClientError> {
        let origin = Origin::parse(url)?;

        let mut state = self.state.lock().await;
        if state.closed {
            return Err(registry_closed());
        }

        if let Some(client) = state.clients.get(&origin) {
            client.set_default_headers(headers).await?;
            return Ok(Arc::clone(client));
        }

        tracing::debug!(origin = %origin, "Creating new HTTP client");
        let client = Arc::new(PooledClient::new(
            origin.clone(),
            Some(headers),
            &self.options,
        )?);
        state.clients.insert(origin, Arc::clone(&client));
        Ok(client)
    }

    /// Close every registered client and stop accepting new lookups.
    ///
    /// Returns how many clients were closed; a second call closes nothing.
    pub async fn close_all(&self) -> usize {
        let clients: Vec<Arc<PooledClient>> = {
            let mut state = self.state.lock().await;
            state.closed = true;
            state.clients.drain().map(|(_, client)| client).collect()
        };

        tracing::debug!(count = clients.len(), "Closing all HTTP clients");

        let mut closed = 0;
        for client in clients {
            if client.close().await {
                closed += 1;
            }
        }
        closed
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether a client is registered for `url`'s origin.
    pub async fn contains(&self, url: &str) -> bool {
        match Origin::parse(url) {
            Ok(origin) => self.state.lock().await.clients.contains_key(&origin),
            Err(_) => false,
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}

fn registry_closed() -> HttpClientError {
    HttpClientError::Closed {
        target: "client registry".to_string(),
    }
}
