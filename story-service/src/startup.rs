//! Application startup and lifecycle management.
//!
//! Builds the shared state once, serves the HTTP API, and on shutdown tears
//! down the outbound HTTP client registry exactly once.

use crate::config::StoryConfig;
use crate::handlers;
use crate::services::{CacheClient, HealthService, StoryService};
use axum::middleware::from_fn;
use axum::{routing::get, Router};
use service_core::error::AppError;
use service_core::http::ClientRegistry;
use service_core::middleware::{
    make_request_span, metrics_middleware, process_time_middleware, request_id_middleware,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: StoryConfig,
    pub http_clients: Arc<ClientRegistry>,
    pub story: StoryService,
    pub health: HealthService,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/story/generate", get(handlers::generate_story))
        .fallback(handlers::not_found)
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(process_time_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: StoryConfig) -> Result<Self, AppError> {
        let http_clients = Arc::new(ClientRegistry::new(config.client_options()));

        let neuron_base_url = config.neuron_base_url()?;
        let story = StoryService::new(
            Arc::clone(&http_clients),
            &neuron_base_url,
            config.neuron.story_prompt.clone(),
        )?;
        tracing::info!(
            url = %story.neuron_run_url(),
            timeout = ?http_clients.options().timeout,
            "Initialized story service"
        );

        let cache = CacheClient::new(&config.cache_url())?;
        let health = HealthService::new(cache, Arc::clone(&http_clients));

        let state = AppState {
            config: config.clone(),
            http_clients,
            story,
            health,
        };

        // port 0 = random port for testing
        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(env = ?config.env, "Story service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The outbound client registry shared by every handler.
    pub fn http_clients(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.state.http_clients)
    }

    /// Run until SIGINT or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_with_shutdown(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves, then close every outbound client.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let http_clients = Arc::clone(&self.state.http_clients);
        let router = build_router(self.state);

        let result = axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        let closed = http_clients.close_all().await;
        tracing::info!(clients = closed, "Closed outbound HTTP clients");

        if let Err(e) = &result {
            tracing::error!("HTTP server error: {}", e);
        }
        result
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
