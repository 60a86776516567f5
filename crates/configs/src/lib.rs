//! # configs
//!
//! Layered settings for the fish tank server.
//!
//! Sources, lowest priority first:
//! 1. compiled-in defaults (`#[serde(default)]` on every section)
//! 2. an optional config file, `fishtank.toml` unless `FISHTANK_CONFIG` names another
//! 3. environment variables such as `FISHTANK__SERVER__PORT=8080`
//!
//! A `.env` file in the working directory is loaded first by `dotenvy`.

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "FISHTANK";
pub const DEFAULT_CONFIG_FILE: &str = "fishtank";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Request body ceiling; sketches travel as base64 inside JSON
    pub body_limit_bytes: usize,
    /// Directory with the browser client, served at `/` when set
    pub static_dir: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            body_limit_bytes: 10 * 1024 * 1024,
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModerationSettings {
    pub min_confidence: f64,
    pub max_label_chars: usize,
    pub hide_threshold: u32,
    pub deny_list: Vec<String>,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.009,
            max_label_chars: 20,
            hide_threshold: 3,
            deny_list: vec![
                "inappropriate".to_string(),
                "offensive".to_string(),
                "nsfw".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_evictions_per_sweep: usize,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            sweep_interval_secs: 3600,
            max_evictions_per_sweep: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BroadcastSettings {
    /// Events queued per observer before it is considered stalled
    pub subscriber_buffer: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 30,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Fallback filter when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub moderation: ModerationSettings,
    pub retention: RetentionSettings,
    pub broadcast: BroadcastSettings,
    pub rate_limit: RateLimitSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Loads `.env`, the config file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        let file = std::env::var(format!("{ENV_PREFIX}_CONFIG"))
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_sources(Some(&file), Self::environment())
    }

    /// The environment source used by [`Settings::load`].
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("moderation.deny_list")
    }

    pub fn from_sources(file: Option<&str>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }
        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.moderation;
        if !(0.0..=1.0).contains(&m.min_confidence) {
            return Err(invalid(format!(
                "moderation.min_confidence ({}) must be within [0, 1]",
                m.min_confidence
            )));
        }
        if m.max_label_chars == 0 {
            return Err(invalid("moderation.max_label_chars must be > 0"));
        }
        if m.hide_threshold == 0 {
            return Err(invalid("moderation.hide_threshold must be > 0"));
        }
        if self.retention.ttl_secs == 0 || self.retention.sweep_interval_secs == 0 {
            return Err(invalid("retention intervals must be > 0"));
        }
        if self.retention.max_evictions_per_sweep == 0 {
            return Err(invalid("retention.max_evictions_per_sweep must be > 0"));
        }
        if self.broadcast.subscriber_buffer == 0 {
            return Err(invalid("broadcast.subscriber_buffer must be > 0"));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(invalid("server.body_limit_bytes must be > 0"));
        }
        if self.rate_limit.enabled && (self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0) {
            return Err(invalid("rate_limit.max_requests and window_secs must be > 0"));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
