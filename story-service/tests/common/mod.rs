use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use service_core::http::{ClientRegistry, Url};
use std::sync::Arc;
use story_service::config::{
    CacheConfig, Environment, HttpConfig, NeuronConfig, StoryConfig,
};
use story_service::startup::Application;
use tokio::sync::oneshot;

pub const TEST_PROMPT: &str = "tell a short story";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub http_clients: Arc<ClientRegistry>,
    shutdown: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
}

/// A local port with nothing listening on it.
pub fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    listener.local_addr().expect("No local addr").port()
}

pub fn test_config(neuron_uri: &str, cache_port: u16) -> StoryConfig {
    let neuron = Url::parse(neuron_uri).expect("Invalid neuron uri");

    StoryConfig {
        common: CoreConfig {
            host: "127.0.0.1".parse().expect("Invalid host"),
            port: 0, // Random port
            log_level: "debug".to_string(),
        },
        env: Environment::Local,
        debug: true,
        http: HttpConfig {
            timeout_secs: 2.0,
            connect_timeout_secs: 1.0,
        },
        neuron: NeuronConfig {
            scheme: neuron.scheme().to_string(),
            host: neuron.host_str().expect("No neuron host").to_string(),
            port: neuron.port_or_known_default().expect("No neuron port"),
            story_prompt: TEST_PROMPT.to_string(),
        },
        cache: CacheConfig {
            scheme: "redis".to_string(),
            host: "127.0.0.1".to_string(),
            port: cache_port,
            user: String::new(),
            password: Secret::new(String::new()),
        },
        otlp_endpoint: None,
    }
}

impl TestApp {
    pub async fn spawn(config: StoryConfig) -> Self {
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let http_clients = app.http_clients();
        let (tx, rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            app.run_with_shutdown(async {
                let _ = rx.await;
            })
            .await
        });

        let address = format!("http://127.0.0.1:{}", port);

        // Wait for the server to accept connections
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client.get(format!("{}/metrics", address)).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            http_clients,
            shutdown: Some(tx),
            server,
        }
    }

    /// Trigger graceful shutdown and wait for the server task to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.server).await;
    }
}
