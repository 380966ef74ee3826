//! Aggregated dependency health.

use super::CacheClient;
use serde::Serialize;
use service_core::http::ClientRegistry;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub cache: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.cache == ComponentStatus::Up
    }
}

#[derive(Clone)]
pub struct HealthService {
    cache: CacheClient,
    http_clients: Arc<ClientRegistry>,
}

impl HealthService {
    pub fn new(cache: CacheClient, http_clients: Arc<ClientRegistry>) -> Self {
        Self {
            cache,
            http_clients,
        }
    }

    pub async fn check(&self) -> HealthReport {
        match self.cache.ping().await {
            Ok(()) => HealthReport {
                cache: ComponentStatus::Up,
                error: None,
            },
            Err(e) => HealthReport {
                cache: ComponentStatus::Down,
                error: Some(e.to_string()),
            },
        }
    }

    /// Ready when the cache answers and outbound clients are still accepted.
    pub async fn is_ready(&self) -> bool {
        !self.http_clients.is_closed().await && self.check().await.is_healthy()
    }
}
