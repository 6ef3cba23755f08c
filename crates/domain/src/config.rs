//! Configuration structures
//!
//! Loaded by `walletkit-infra`'s config loader from the environment or from a
//! JSON/TOML file. Every section has serde defaults so a file only needs to
//! name what it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LOG_LEVEL, DEFAULT_OAUTH_BASE_URL,
    DEFAULT_PUBLIC_BASE_URL, DEFAULT_USER_AGENT, RECENT_REFRESH_WINDOW_SECS,
};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote API endpoints and client identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL for authenticated wallet calls
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Base URL for unauthenticated calls (server information)
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Base URL of the OAuth server (the refresh grant is POSTed to `/token`)
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,

    /// OAuth client identifier
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret, if the client is confidential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Per-request timeout enforced by the HTTP transport
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ApiConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            public_base_url: default_public_base_url(),
            oauth_base_url: default_oauth_base_url(),
            client_id: String::new(),
            client_secret: None,
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

/// Tuning for the dispatch core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Window after a refresh during which expired-token failures are
    /// re-dispatched instead of starting another refresh
    #[serde(default = "default_recent_refresh_window")]
    pub recent_refresh_window_seconds: u64,
}

impl DispatcherConfig {
    #[must_use]
    pub fn recent_refresh_window(&self) -> Duration {
        Duration::from_secs(self.recent_refresh_window_seconds)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { recent_refresh_window_seconds: default_recent_refresh_window() }
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG` when set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_public_base_url() -> String {
    DEFAULT_PUBLIC_BASE_URL.to_string()
}

fn default_oauth_base_url() -> String {
    DEFAULT_OAUTH_BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_recent_refresh_window() -> u64 {
    RECENT_REFRESH_WINDOW_SECS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
