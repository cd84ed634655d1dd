//! Relay configuration with layered resolution
//!
//! Resolution order (highest priority first):
//! 1. Environment variables (`ANALYTICS_*`)
//! 2. TOML config file, if one is given
//! 3. Compiled defaults
//!
//! Field names in the TOML file are camelCase:
//!
//! ```toml
//! serverUrl = "https://collector.example.com/events"
//! cooldownBeforeSend = 1.0
//! maxMessagesForSave = 1000
//! networkingTimeoutSeconds = 10
//! networkingWaitSecondsForNextTry = 15.0
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AnalyticsError, AnalyticsResult};

/// Tunables for batching, delivery and persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsConfig {
    /// Collector endpoint receiving batches via POST
    pub server_url: String,
    /// Debounce window before each batch attempt, in seconds
    pub cooldown_before_send: f64,
    /// Cap on events per batch and per persisted snapshot
    pub max_messages_for_save: usize,
    /// Request timeout, in seconds
    pub networking_timeout_seconds: u64,
    /// Fixed wait after a failed attempt, in seconds
    pub networking_wait_seconds_for_next_try: f64,
    /// Apply `max_messages_for_save` to the live queue too, dropping the
    /// oldest events. Off by default: the unbounded queue is the
    /// compatible behavior.
    pub trim_live_queue: bool,
    /// Location of the file store
    pub store_path: PathBuf,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            cooldown_before_send: 1.0,
            max_messages_for_save: 1000,
            networking_timeout_seconds: 10,
            networking_wait_seconds_for_next_try: 15.0,
            trim_live_queue: false,
            store_path: PathBuf::from("analytics_prefs.json"),
        }
    }
}

impl AnalyticsConfig {
    /// Create a config for `server_url` with default tunables
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    /// Load config from an optional TOML file, then apply env overrides
    pub fn load(path: Option<&Path>) -> AnalyticsResult<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    AnalyticsError::ConfigParse {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    }
                })?;
                Self::parse(&content, &path.display().to_string())?
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> AnalyticsResult<Self> {
        let config = Self::parse(toml_str, "<string>")?;
        config.validate()?;
        Ok(config)
    }

    fn parse(toml_str: &str, origin: &str) -> AnalyticsResult<Self> {
        toml::from_str(toml_str).map_err(|e| AnalyticsError::ConfigParse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Override fields from `ANALYTICS_*` environment variables
    ///
    /// Values that fail to parse are logged and skipped.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("ANALYTICS_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(v) = env_parsed("ANALYTICS_COOLDOWN_BEFORE_SEND") {
            self.cooldown_before_send = v;
        }
        if let Some(v) = env_parsed("ANALYTICS_MAX_MESSAGES_FOR_SAVE") {
            self.max_messages_for_save = v;
        }
        if let Some(v) = env_parsed("ANALYTICS_NETWORKING_TIMEOUT_SECONDS") {
            self.networking_timeout_seconds = v;
        }
        if let Some(v) = env_parsed("ANALYTICS_NETWORKING_WAIT_SECONDS_FOR_NEXT_TRY") {
            self.networking_wait_seconds_for_next_try = v;
        }
        if let Some(v) = env_parsed("ANALYTICS_TRIM_LIVE_QUEUE") {
            self.trim_live_queue = v;
        }
        if let Ok(path) = env::var("ANALYTICS_STORE_PATH") {
            self.store_path = PathBuf::from(path);
        }
    }

    /// Validate the configuration values
    pub fn validate(&self) -> AnalyticsResult<()> {
        match Url::parse(&self.server_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(invalid(
                    "serverUrl",
                    format!("unsupported scheme '{}'", url.scheme()),
                ))
            }
            Err(e) => return Err(invalid("serverUrl", e.to_string())),
        }

        check_seconds("cooldownBeforeSend", self.cooldown_before_send)?;
        check_seconds(
            "networkingWaitSecondsForNextTry",
            self.networking_wait_seconds_for_next_try,
        )?;

        if self.networking_timeout_seconds == 0 {
            return Err(invalid("networkingTimeoutSeconds", "must be greater than 0"));
        }

        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        seconds(self.cooldown_before_send)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.networking_timeout_seconds)
    }

    pub fn retry_wait(&self) -> Duration {
        seconds(self.networking_wait_seconds_for_next_try)
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

/// Unvalidated negative or non-finite values collapse to zero
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

fn check_seconds(field: &str, value: f64) -> AnalyticsResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(field, "must be a finite number of seconds >= 0"));
    }
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::ConfigInvalid {
        field: field.to_string(),
        message: message.into(),
    }
}
