//! Configuration for ingest-watch
//!
//! Values come from a TOML file, then `INGEST_WATCH_*` environment
//! variables on top, then CLI flags on top of that. Without a file,
//! everything falls back to defaults that match the stock backend
//! deployment.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::subscription::{ReconnectPolicy, SubscriptionConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub server: ServerSettings,
    pub subscription: SubscriptionSettings,
    pub logging: LoggingSettings,
}

/// Where the progress endpoint lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Base WebSocket URL; the task id becomes the final path segment
    pub url: String,
}

/// Timing knobs for one subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionSettings {
    pub keepalive_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn, or error
    pub level: String,

    /// Log file path; absent means console only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Rotated files to keep
    pub max_files: u32,

    /// Emit JSON lines instead of human-readable output
    pub json_format: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/api/ws/upload".to_string(),
        }
    }
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            keepalive_interval_ms: 25_000,
            reconnect_delay_ms: 3_000,
            max_reconnect_attempts: 5,
            connect_timeout_ms: 10_000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl WatchConfig {
    /// Load from `config_path` (or the search locations), apply env
    /// overrides, expand paths, validate.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = match Self::locate(config_path)? {
            Some(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    Error::config_parse(format!("Failed to read config file: {}", e))
                })?;
                let parsed = toml::from_str(&content).map_err(|e| {
                    Error::config_parse(format!("Failed to parse config file: {}", e))
                })?;
                info!(path = %path.display(), "Configuration loaded from file");
                parsed
            }
            None => {
                debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        if let Some(file) = config.logging.file.take() {
            config.logging.file = Some(expand_path(&file));
        }
        config.validate()?;
        Ok(config)
    }

    /// An explicit path must exist; otherwise try the usual spots.
    fn locate(explicit: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            let path = PathBuf::from(shellexpand::tilde(path).as_ref());
            return if path.exists() {
                Ok(Some(path))
            } else {
                Err(Error::config_not_found(path))
            };
        }

        let candidates = [
            Some(PathBuf::from("ingest-watch.toml")),
            Some(PathBuf::from("config.toml")),
            dirs::config_dir().map(|d| d.join("ingest-watch").join("config.toml")),
            dirs::home_dir().map(|d| d.join(".ingest-watch.toml")),
        ];
        Ok(candidates
            .into_iter()
            .flatten()
            .find(|candidate| candidate.exists()))
    }

    fn apply_env_overrides(&mut self) {
        fn env(name: &str) -> Option<String> {
            std::env::var(name).ok()
        }

        if let Some(url) = env("INGEST_WATCH_URL") {
            self.server.url = url;
        }
        if let Some(ms) = env("INGEST_WATCH_KEEPALIVE_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.subscription.keepalive_interval_ms = ms;
        }
        if let Some(ms) = env("INGEST_WATCH_RECONNECT_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.subscription.reconnect_delay_ms = ms;
        }
        if let Some(n) = env("INGEST_WATCH_MAX_RECONNECT_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.subscription.max_reconnect_attempts = n;
        }
        if let Some(ms) = env("INGEST_WATCH_CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.subscription.connect_timeout_ms = ms;
        }
        if let Some(level) = env("INGEST_WATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(file) = env("INGEST_WATCH_LOG_FILE") {
            self.logging.file = Some(file);
        }
        if let Some(json) = env("INGEST_WATCH_LOG_JSON") {
            self.logging.json_format = json == "1" || json.eq_ignore_ascii_case("true");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.url.is_empty() {
            return Err(Error::config_validation("Endpoint URL cannot be empty"));
        }
        if !self.server.url.starts_with("ws://") && !self.server.url.starts_with("wss://") {
            return Err(Error::config_validation(
                "Endpoint URL must start with ws:// or wss://",
            ));
        }
        if self.subscription.keepalive_interval_ms == 0 {
            return Err(Error::config_validation(
                "keepalive_interval_ms must be greater than zero",
            ));
        }
        if self.subscription.connect_timeout_ms == 0 {
            return Err(Error::config_validation(
                "connect_timeout_ms must be greater than zero",
            ));
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_validation(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    /// The subscription client's view of these settings
    pub fn subscription_config(&self) -> SubscriptionConfig {
        SubscriptionConfig {
            base_url: self.server.url.clone(),
            connect_timeout: Duration::from_millis(self.subscription.connect_timeout_ms),
            keepalive_interval: Duration::from_millis(self.subscription.keepalive_interval_ms),
            reconnect: ReconnectPolicy::new(
                self.subscription.max_reconnect_attempts,
                Duration::from_millis(self.subscription.reconnect_delay_ms),
            ),
        }
    }
}

fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Write a commented default config, refusing to clobber unless forced.
pub fn init_config(path: Option<&str>, force: bool) -> Result<()> {
    let target = match path {
        Some(p) => PathBuf::from(expand_path(p)),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ingest-watch")
            .join("config.toml"),
    };

    if target.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            target.display()
        )));
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, DEFAULT_CONFIG)?;

    println!("Configuration file created: {}", target.display());
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# ingest-watch Configuration
# https://github.com/kb-tools/ingest-watch

[server]
# Base WebSocket URL of the per-task upload progress endpoint.
# The task id is appended as the final path segment.
url = "ws://127.0.0.1:8000/api/ws/upload"

[subscription]
# Keepalive ping interval in milliseconds
keepalive_interval_ms = 25000

# Fixed delay between reconnect attempts in milliseconds
reconnect_delay_ms = 3000

# Maximum reconnect attempts per subscription
max_reconnect_attempts = 5

# Connection attempt timeout in milliseconds
connect_timeout_ms = 10000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.local/state/ingest-watch/watch.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#;
