//! Settings for a watch session.
//!
//! Values are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. an optional config file (TOML, JSON or YAML, picked by extension)
//! 3. `ENIGMA_*` environment variables (`ENIGMA_API_URL`, `ENIGMA_WS_URL`, ...)
//! 4. command-line flags, applied by the binary
//!
//! ```toml
//! api_url = "http://localhost:8000"
//! ws_url = "ws://localhost:8000/ws/dashboard"
//! freshness_window = "2s"
//! reconnect_max = "30s"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use enigma_sync::{Backoff, SessionConfig, DEFAULT_STREAM_URL};
use serde::{Deserialize, Serialize};

use crate::data::duration::parse_duration;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "ENIGMA";

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Raw settings as read from files and the environment.
///
/// Durations are strings such as `"2s"` or `"1500ms"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub ws_url: String,
    /// Upgrade `ws://` to `wss://` before connecting.
    pub secure_context: bool,
    pub feed_capacity: usize,
    pub freshness_window: String,
    pub keepalive: String,
    pub reconnect_base: String,
    pub reconnect_max: String,
    pub health_interval: String,
    pub request_timeout: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_STREAM_URL.to_string(),
            secure_context: false,
            feed_capacity: 200,
            freshness_window: "2s".to_string(),
            keepalive: "30s".to_string(),
            reconnect_base: "1s".to_string(),
            reconnect_max: "30s".to_string(),
            health_interval: "30s".to_string(),
            request_timeout: "10s".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(env)
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        // Surface bad values at startup rather than on first use
        settings.session_config()?;
        settings.request_timeout()?;
        Ok(settings)
    }

    /// Build the session configuration these settings describe.
    pub fn session_config(&self) -> Result<SessionConfig> {
        if self.ws_url.trim().is_empty() {
            bail!("ws_url must not be empty");
        }
        if self.feed_capacity == 0 {
            bail!("feed_capacity must be at least 1");
        }

        let backoff = Backoff::new(
            duration_field("reconnect_base", &self.reconnect_base)?,
            duration_field("reconnect_max", &self.reconnect_max)?,
        );
        if backoff.base.is_zero() || backoff.base > backoff.max {
            bail!(
                "reconnect_base must be positive and no larger than reconnect_max ({} > {})",
                self.reconnect_base,
                self.reconnect_max
            );
        }

        Ok(SessionConfig {
            stream_url: self.ws_url.trim().to_string(),
            secure_context: self.secure_context,
            keepalive: positive("keepalive", &self.keepalive)?,
            backoff,
            feed_capacity: self.feed_capacity,
            freshness_window: duration_field("freshness_window", &self.freshness_window)?,
            health_interval: positive("health_interval", &self.health_interval)?,
        })
    }

    /// Timeout for REST requests.
    pub fn request_timeout(&self) -> Result<Duration> {
        positive("request_timeout", &self.request_timeout)
    }
}

fn duration_field(name: &str, value: &str) -> Result<Duration> {
    parse_duration(value).with_context(|| format!("Invalid {}", name))
}

fn positive(name: &str, value: &str) -> Result<Duration> {
    let duration = duration_field(name, value)?;
    if duration.is_zero() {
        bail!("{} must be greater than zero", name);
    }
    Ok(duration)
}
