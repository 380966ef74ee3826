use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::http::{ClientOptions, Url};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default total timeout for calls to the neuron server, in seconds.
const DEFAULT_HTTP_TIMEOUT_SECS: f64 = 30.0;

const DEFAULT_STORY_PROMPT: &str = "generate a islamic story";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "dev" | "development" | "test" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown environment '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoryConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub env: Environment,
    pub debug: bool,
    pub http: HttpConfig,
    pub neuron: NeuronConfig,
    pub cache: CacheConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Total request timeout in seconds; zero or negative disables it.
    pub timeout_secs: f64,
    /// Connect phase timeout in seconds; zero or negative disables it.
    pub connect_timeout_secs: f64,
}

impl HttpConfig {
    /// Parse and validate raw `HTTP_TIMEOUT` / `HTTP_CONNECT_TIMEOUT` values.
    pub fn from_raw(timeout: &str, connect_timeout: &str) -> Result<Self, AppError> {
        let timeout_secs = parse_number("HTTP_TIMEOUT", timeout)?;
        timeout_from_secs("HTTP_TIMEOUT", timeout_secs)?;

        let connect_timeout_secs = parse_number("HTTP_CONNECT_TIMEOUT", connect_timeout)?;
        timeout_from_secs("HTTP_CONNECT_TIMEOUT", connect_timeout_secs)?;

        Ok(Self {
            timeout_secs,
            connect_timeout_secs,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NeuronConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub story_prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
}

impl StoryConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let env_name = get_env("ENV", Some("local"), false)?;
        let environment: Environment = env_name.parse()?;
        let is_prod = environment == Environment::Prod;

        Ok(StoryConfig {
            common: common_config,
            env: environment,
            debug: parse_bool(&get_env("DEBUG", Some("false"), false)?),
            http: HttpConfig::from_raw(
                &get_env(
                    "HTTP_TIMEOUT",
                    Some(&DEFAULT_HTTP_TIMEOUT_SECS.to_string()),
                    is_prod,
                )?,
                &get_env("HTTP_CONNECT_TIMEOUT", Some("0"), false)?,
            )?,
            neuron: NeuronConfig {
                scheme: get_env("NEURON_SERVER_SCHEMA", Some("http"), is_prod)?,
                host: get_env("NEURON_SERVER_HOST", Some("localhost"), is_prod)?,
                port: parse_number(
                    "NEURON_SERVER_PORT",
                    &get_env("NEURON_SERVER_PORT", Some("8000"), is_prod)?,
                )?,
                story_prompt: get_env("NEURON_STORY_PROMPT", Some(DEFAULT_STORY_PROMPT), false)?,
            },
            cache: CacheConfig {
                scheme: get_env("CACHE_SCHEMA", Some("redis"), is_prod)?,
                host: get_env("CACHE_HOST", Some("localhost"), is_prod)?,
                port: parse_number("CACHE_PORT", &get_env("CACHE_PORT", Some("6379"), is_prod)?)?,
                user: get_env("CACHE_USER", Some(""), is_prod)?,
                password: Secret::new(get_env("CACHE_PASSWORD", Some(""), is_prod)?),
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
        })
    }

    pub fn is_local(&self) -> bool {
        self.env == Environment::Local
    }

    pub fn is_prod(&self) -> bool {
        self.env == Environment::Prod
    }

    /// Log level to use when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.common.log_level
        }
    }

    /// `scheme://host:port/`, the root every neuron endpoint hangs off.
    pub fn neuron_base_url(&self) -> Result<Url, AppError> {
        let raw = format!(
            "{}://{}:{}/",
            self.neuron.scheme, self.neuron.host, self.neuron.port
        );
        Url::parse(&raw).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid neuron base url '{}': {}", raw, e))
        })
    }

    /// Redis connection string. Credentials are only included outside local.
    pub fn cache_url(&self) -> String {
        if self.is_local() {
            return format!(
                "{}://{}:{}",
                self.cache.scheme, self.cache.host, self.cache.port
            );
        }

        format!(
            "{}://{}:{}@{}:{}",
            self.cache.scheme,
            urlencoding::encode(&self.cache.user),
            urlencoding::encode(self.cache.password.expose_secret()),
            self.cache.host,
            self.cache.port
        )
    }

    /// Pool settings for the outbound registry.
    ///
    /// Timeouts that [`HttpConfig::from_raw`] would reject are logged and
    /// treated as disabled.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: checked_timeout("HTTP_TIMEOUT", self.http.timeout_secs),
            connect_timeout: checked_timeout(
                "HTTP_CONNECT_TIMEOUT",
                self.http.connect_timeout_secs,
            ),
            user_agent: Some(format!("story-service/{}", env!("CARGO_PKG_VERSION"))),
            ..ClientOptions::default()
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// `None` for zero or negative seconds; an error for NaN, infinity, or values
/// too large for a `Duration`.
fn timeout_from_secs(key: &str, secs: f64) -> Result<Option<Duration>, AppError> {
    if !secs.is_finite() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be a finite number of seconds, got {}",
            key,
            secs
        )));
    }
    if secs <= 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs).map(Some).map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} is out of range ({}): {}", key, secs, e))
    })
}

fn checked_timeout(key: &str, secs: f64) -> Option<Duration> {
    timeout_from_secs(key, secs).unwrap_or_else(|e| {
        tracing::warn!("Ignoring invalid timeout: {}", e);
        None
    })
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
