//! A connection-pooled HTTP client bound to a single origin.

use super::origin::path_and_query;
use super::{HttpClientError, Origin};
use crate::observability::propagation::inject_trace_context;
use metrics::{counter, histogram};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Pool and timeout settings applied to every client a registry builds.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Bound on the whole request (connect + send + receive). `None` leaves
    /// the request unbounded.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
    pub tcp_keepalive: Option<Duration>,
    pub user_agent: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: None,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 10,
            tcp_keepalive: Some(Duration::from_secs(60)),
            user_agent: None,
        }
    }
}

/// How a successful response body is decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Json,
    Text,
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    /// Raw text for `Text`, serialized JSON for `Json`.
    pub fn into_text(self) -> String {
        match self {
            Payload::Json(value) => value.to_string(),
            Payload::Text(text) => text,
        }
    }

    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        match self {
            Payload::Json(value) => serde_json::from_value(value),
            Payload::Text(text) => serde_json::from_str(&text),
        }
    }
}

struct ClientState {
    // `None` once closed
    client: Option<reqwest::Client>,
    default_headers: HeaderMap,
}

/// HTTP client for one origin, sharing a single `reqwest` connection pool.
///
/// Requests always go to this client's origin: only the path and query of
/// the URL passed to [`get`](Self::get) / [`post`](Self::post) are used.
///
/// Headers are merged per request: the client's default headers first, then
/// the per-call headers. When both carry the same header name the per-call
/// value wins.
pub struct PooledClient {
    origin: Origin,
    timeout: Option<Duration>,
    state: RwLock<ClientState>,
}

impl PooledClient {
    pub fn new(
        origin: Origin,
        headers: Option<HeaderMap>,
        options: &ClientOptions,
    ) -> Result<Self, HttpClientError> {
        let mut builder = reqwest::Client::builder()
            .pool_idle_timeout(options.pool_idle_timeout)
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .tcp_keepalive(options.tcp_keepalive);

        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = options.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        let client = builder.build().map_err(HttpClientError::Build)?;

        tracing::debug!(
            origin = %origin,
            timeout = ?options.timeout,
            "Created pooled HTTP client"
        );

        Ok(Self {
            origin,
            timeout: options.timeout,
            state: RwLock::new(ClientState {
                client: Some(client),
                default_headers: headers.unwrap_or_default(),
            }),
        })
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn is_closed(&self) -> bool {
        self.state.read().await.client.is_none()
    }

    pub async fn default_headers(&self) -> HeaderMap {
        self.state.read().await.default_headers.clone()
    }

    /// Replace the default headers sent with every request.
    pub async fn set_default_headers(&self, headers: HeaderMap) -> Result<(), HttpClientError> {
        let mut state = self.state.write().await;
        if state.client.is_none() {
            return Err(self.closed_error());
        }
        state.default_headers = headers;
        tracing::debug!(origin = %self.origin, "Replaced default headers");
        Ok(())
    }

    /// Issue a GET for the path and query of `url`, appending `params`.
    ///
    /// Pass `&()` when there are no extra query parameters.
    pub async fn get<Q>(
        &self,
        url: &Url,
        params: &Q,
        headers: Option<&HeaderMap>,
        format: ResponseFormat,
    ) -> Result<Payload, HttpClientError>
    where
        Q: Serialize + ?Sized,
    {
        let (client, target, request_headers) = self.prepare(url, headers).await?;
        let request = client.get(target).headers(request_headers).query(params);
        self.execute(Method::GET, url, request, format).await
    }

    /// Issue a POST for the path and query of `url` with `body` as JSON.
    pub async fn post<B>(
        &self,
        url: &Url,
        body: &B,
        headers: Option<&HeaderMap>,
        format: ResponseFormat,
    ) -> Result<Payload, HttpClientError>
    where
        B: Serialize + ?Sized,
    {
        let (client, target, request_headers) = self.prepare(url, headers).await?;
        let request = client.post(target).headers(request_headers).json(body);
        self.execute(Method::POST, url, request, format).await
    }

    /// Release the connection pool. Returns `false` if already closed.
    ///
    /// Requests already in flight finish on their own handle; every request
    /// started afterwards fails with [`HttpClientError::Closed`].
    pub async fn close(&self) -> bool {
        let mut state = self.state.write().await;
        if state.client.take().is_some() {
            tracing::debug!(origin = %self.origin, "Closing HTTP client");
            true
        } else {
            false
        }
    }

    async fn prepare(
        &self,
        url: &Url,
        headers: Option<&HeaderMap>,
    ) -> Result<(reqwest::Client, Url, HeaderMap), HttpClientError> {
        let (client, mut merged) = {
            let state = self.state.read().await;
            let client = state.client.clone().ok_or_else(|| self.closed_error())?;
            (client, state.default_headers.clone())
        };

        if let Some(headers) = headers {
            // replaces every value of each name present in `headers`
            merged.extend(headers.clone());
        }
        inject_trace_context(&mut merged);

        match Origin::from_url(url) {
            Ok(origin) if origin == self.origin => {}
            _ => tracing::warn!(
                origin = %self.origin,
                url = %url,
                "URL does not match client origin, using its path only"
            ),
        }

        Ok((client, self.origin.join(url), merged))
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        request: RequestBuilder,
        format: ResponseFormat,
    ) -> Result<Payload, HttpClientError> {
        let path = path_and_query(url);
        tracing::debug!(
            origin = %self.origin,
            method = %method,
            path = %path,
            "Sending request"
        );

        let start = Instant::now();
        let result = self.send(request, format).await;
        let elapsed = start.elapsed();

        let outcome = match &result {
            Ok(_) => "success",
            Err(HttpClientError::Status { .. }) => "status",
            Err(HttpClientError::Decode { .. }) => "decode",
            Err(_) => "transport",
        };
        let labels = [
            ("origin", self.origin.to_string()),
            ("method", method.to_string()),
        ];
        counter!(
            "http_client_requests_total",
            "origin" => self.origin.to_string(),
            "method" => method.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!("http_client_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());

        if let Err(e) = &result {
            tracing::debug!(
                origin = %self.origin,
                method = %method,
                path = %path,
                error = %e,
                "Request failed"
            );
        }

        result
    }

    async fn send(
        &self,
        request: RequestBuilder,
        format: ResponseFormat,
    ) -> Result<Payload, HttpClientError> {
        let response = request
            .send()
            .await
            .map_err(|source| self.transport_error(source))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        if status.is_client_error() || status.is_server_error() {
            // the status is the error; an unreadable body only loses detail
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(
                        origin = %self.origin,
                        status = status.as_u16(),
                        error = %e,
                        "Failed to read error response body"
                    );
                    String::new()
                }
            };
            tracing::debug!(
                origin = %self.origin,
                status = status.as_u16(),
                response_bytes = body.len(),
                "Received error status"
            );
            return Err(HttpClientError::Status {
                origin: self.origin.to_string(),
                status,
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| self.transport_error(source))?;

        tracing::debug!(
            origin = %self.origin,
            status = status.as_u16(),
            response_bytes = body.len(),
            "Received response"
        );

        match format {
            ResponseFormat::Text => Ok(Payload::Text(body)),
            ResponseFormat::Json => self.decode_json(content_type.as_deref(), &body),
        }
    }

    fn decode_json(&self, content_type: Option<&str>, body: &str) -> Result<Payload, HttpClientError> {
        if body.trim().is_empty() {
            return Ok(Payload::Json(Value::Null));
        }

        if let Some(content_type) = content_type
            && !is_json_content_type(content_type)
        {
            return Err(HttpClientError::Decode {
                origin: self.origin.to_string(),
                reason: format!("unexpected content type '{}'", content_type),
            });
        }

        serde_json::from_str(body)
            .map(Payload::Json)
            .map_err(|e| HttpClientError::Decode {
                origin: self.origin.to_string(),
                reason: e.to_string(),
            })
    }

    fn transport_error(&self, source: reqwest::Error) -> HttpClientError {
        HttpClientError::Transport {
            origin: self.origin.to_string(),
            source,
        }
    }

    fn closed_error(&self) -> HttpClientError {
        HttpClientError::Closed {
            target: self.origin.to_string(),
        }
    }
}

impl std::fmt::Debug for PooledClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledClient")
            .field("origin", &self.origin)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}
