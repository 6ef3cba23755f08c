//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Loads a `.env` file from the working directory, if present
//! 2. Attempts to load from environment variables
//! 3. If required variables are missing, falls back to loading from file
//! 4. Probes multiple paths for config files
//! 5. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `WALLETKIT_API_BASE_URL`: Wallet REST API base URL (required)
//! - `WALLETKIT_CLIENT_ID`: OAuth client id (required)
//! - `WALLETKIT_CLIENT_SECRET`: OAuth client secret
//! - `WALLETKIT_PUBLIC_BASE_URL`: Public API base URL
//! - `WALLETKIT_OAUTH_BASE_URL`: OAuth endpoint base URL
//! - `WALLETKIT_HTTP_TIMEOUT_SECS`: HTTP timeout in seconds
//! - `WALLETKIT_USER_AGENT`: User agent sent with every request
//! - `WALLETKIT_RECENT_REFRESH_WINDOW_SECS`: Recent-refresh window in seconds
//! - `WALLETKIT_LOG_LEVEL`: Default log filter
//! - `WALLETKIT_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./walletkit.json` or `./walletkit.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use url::Url;
use walletkit_domain::{
    ApiConfig, Config, DispatcherConfig, LoggingConfig, Result, WalletKitError,
};

/// Load the client configuration, environment first
///
/// A `.env` file is applied before the environment is read. When a required
/// variable is absent the first probed config file is used instead.
///
/// # Errors
/// Returns `WalletKitError::Config` when neither source yields a valid
/// configuration.
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "applied .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration read from environment");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "environment incomplete, probing config files");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `WALLETKIT_API_BASE_URL` and `WALLETKIT_CLIENT_ID` are required;
/// everything else falls back to its default.
///
/// # Errors
/// Returns `WalletKitError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let defaults = Config::default();

    let api = ApiConfig {
        base_url: env_var("WALLETKIT_API_BASE_URL")?,
        public_base_url: env_or("WALLETKIT_PUBLIC_BASE_URL", defaults.api.public_base_url),
        oauth_base_url: env_or("WALLETKIT_OAUTH_BASE_URL", defaults.api.oauth_base_url),
        client_id: env_var("WALLETKIT_CLIENT_ID")?,
        client_secret: std::env::var("WALLETKIT_CLIENT_SECRET").ok(),
        timeout_seconds: env_parse("WALLETKIT_HTTP_TIMEOUT_SECS", defaults.api.timeout_seconds)?,
        user_agent: env_or("WALLETKIT_USER_AGENT", defaults.api.user_agent),
    };

    let dispatcher = DispatcherConfig {
        recent_refresh_window_seconds: env_parse(
            "WALLETKIT_RECENT_REFRESH_WINDOW_SECS",
            defaults.dispatcher.recent_refresh_window_seconds,
        )?,
    };

    let logging = LoggingConfig {
        level: env_or("WALLETKIT_LOG_LEVEL", defaults.logging.level),
        json: env_bool("WALLETKIT_LOG_JSON", defaults.logging.json),
    };

    let config = Config { api, dispatcher, logging };
    validate(&config)?;
    Ok(config)
}

/// Read a JSON or TOML config file
///
/// `None` uses the first path returned by [`probe_config_paths`].
///
/// # Errors
/// Returns `WalletKitError::Config` for a missing file, a parse failure or
/// an invalid URL.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(WalletKitError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            WalletKitError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "reading configuration file");

    let contents = std::fs::read_to_string(&config_path).map_err(|e| {
        WalletKitError::Config(format!("cannot read {}: {e}", config_path.display()))
    })?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse `contents` as TOML or JSON according to the file extension
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(std::ffi::OsStr::to_str).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| WalletKitError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| WalletKitError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(WalletKitError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Check every base URL parses and the client id is set
fn validate(config: &Config) -> Result<()> {
    for (name, value) in [
        ("api.base_url", &config.api.base_url),
        ("api.public_base_url", &config.api.public_base_url),
        ("api.oauth_base_url", &config.api.oauth_base_url),
    ] {
        Url::parse(value)
            .map_err(|e| WalletKitError::Config(format!("Invalid URL for {name}: {e}")))?;
    }

    if config.api.client_id.trim().is_empty() {
        return Err(WalletKitError::Config("api.client_id must not be empty".to_string()));
    }

    Ok(())
}

/// First existing config file near the working directory or the executable
pub fn probe_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok();
    let exe_dir = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf));

    [cwd, exe_dir]
        .into_iter()
        .flatten()
        .flat_map(|dir| candidates_in(&dir))
        .find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("walletkit.json"),
        dir.join("walletkit.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
    ]
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| WalletKitError::Config(format!("{key} is not set")))
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

/// Parse an optional numeric environment variable
///
/// # Errors
/// Returns `WalletKitError::Config` if the variable is set but does not parse.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| WalletKitError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// `1`, `true`, `yes` and `on` (any case) are true
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
