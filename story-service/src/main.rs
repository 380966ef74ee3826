use service_core::observability::{init_tracing, shutdown_tracing};
use story_service::config::StoryConfig;
use story_service::services::init_metrics;
use story_service::startup::Application;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = StoryConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "story-service",
        config.log_level(),
        config.otlp_endpoint.as_deref(),
    );
    init_metrics();

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        anyhow::anyhow!("Startup error: {}", e)
    })?;

    app.run_until_stopped().await?;

    shutdown_tracing();
    Ok(())
}
