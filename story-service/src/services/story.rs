//! Story generation, delegated to the neuron agent endpoint.

use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use service_core::http::{ClientRegistry, ResponseFormat, Url};
use std::sync::Arc;

const AGENT_RUN_PATH: &str = "agent/run";

#[derive(Debug, Serialize)]
struct AgentRunRequest<'a> {
    prompt: &'a str,
}

#[derive(Clone)]
pub struct StoryService {
    http_clients: Arc<ClientRegistry>,
    neuron_run_url: Url,
    prompt: String,
}

impl StoryService {
    pub fn new(
        http_clients: Arc<ClientRegistry>,
        neuron_base_url: &Url,
        prompt: impl Into<String>,
    ) -> Result<Self, AppError> {
        let neuron_run_url = neuron_base_url.join(AGENT_RUN_PATH).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid neuron run url from '{}': {}",
                neuron_base_url,
                e
            ))
        })?;

        Ok(Self {
            http_clients,
            neuron_run_url,
            prompt: prompt.into(),
        })
    }

    pub fn neuron_run_url(&self) -> &Url {
        &self.neuron_run_url
    }

    /// Ask the neuron agent for a story and return its JSON reply untouched.
    ///
    /// Upstream failures are logged here and returned to the caller, so an
    /// outage is never mistaken for an empty story.
    pub async fn generate_story(&self) -> Result<Value, AppError> {
        let client = self
            .http_clients
            .get_client(self.neuron_run_url.as_str(), None)
            .await?;

        let request = AgentRunRequest {
            prompt: &self.prompt,
        };

        let payload = client
            .post(&self.neuron_run_url, &request, None, ResponseFormat::Json)
            .await
            .map_err(|e| {
                tracing::error!(
                    url = %self.neuron_run_url,
                    error = %e,
                    "Story generation request failed"
                );
                e
            })?;

        // `Json` format never yields text
        Ok(payload.into_json().unwrap_or(Value::Null))
    }
}
