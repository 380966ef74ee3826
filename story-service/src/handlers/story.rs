use crate::dtos::Success;
use crate::startup::AppState;
use axum::extract::State;
use serde_json::Value;
use service_core::error::AppError;

/// `GET /story/generate`: proxy one story from the neuron agent.
pub async fn generate_story(State(state): State<AppState>) -> Result<Success<Value>, AppError> {
    let story = state.story.generate_story().await?;
    Ok(Success::ok(story))
}
