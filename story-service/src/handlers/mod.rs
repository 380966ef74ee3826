//! HTTP handlers for the story service.

pub mod health;
pub mod metrics;
pub mod story;

pub use health::{health_check, readiness_check};
pub use metrics::metrics;
pub use story::generate_story;

use axum::http::Uri;
use service_core::error::AppError;

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(anyhow::anyhow!("No route for {}", uri.path()))
}
