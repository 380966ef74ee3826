//! Redis cache client.
//!
//! The service only needs the cache to be reachable; it backs the health and
//! readiness probes.

use service_core::error::AppError;
use std::time::Duration;

const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct CacheClient {
    client: redis::Client,
}

impl CacheClient {
    /// Parse the connection string. No connection is made until first use.
    pub fn new(cache_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(cache_url).map_err(|e| {
            tracing::error!("Invalid cache url: {}", e);
            AppError::ConfigError(anyhow::anyhow!("Invalid cache url: {}", e))
        })?;
        Ok(Self { client })
    }

    /// Round-trip a `PING`, bounded by a short timeout.
    pub async fn ping(&self) -> Result<(), AppError> {
        let ping = async {
            let mut con = self.client.get_multiplexed_async_connection().await?;
            let reply: String = redis::cmd("PING").query_async(&mut con).await?;
            Ok::<_, redis::RedisError>(reply)
        };

        match tokio::time::timeout(PING_TIMEOUT, ping).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                tracing::warn!("Cache health check failed: {}", e);
                Err(AppError::RedisError(e))
            }
            Err(_) => {
                tracing::warn!("Cache health check timed out");
                Err(AppError::ServiceUnavailable)
            }
        }
    }
}
