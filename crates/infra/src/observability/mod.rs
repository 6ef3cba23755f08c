//! Tracing subscriber setup
//!
//! Applications call [`init_tracing`] once at startup. Library code only
//! emits `tracing` events and never installs a subscriber itself.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use walletkit_domain::{LoggingConfig, WalletKitError};

/// Install the global fmt subscriber described by `config`
///
/// `RUST_LOG` takes precedence over `config.level`. Returns `Ok(false)`
/// without changing anything if a global subscriber is already set, so
/// repeated calls are harmless.
///
/// # Errors
///
/// Returns `WalletKitError::Config` if `config.level` is not a valid filter
/// directive and `RUST_LOG` is unset.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, WalletKitError> {
    let filter = env_filter(config)?;

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init()
    };

    match installed {
        Ok(()) => {
            tracing::info!(level = %config.level, json = config.json, "tracing initialized");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, WalletKitError> {
    EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(&config.level).map_err(|e| {
            WalletKitError::Config(format!("Invalid log level '{}': {e}", config.level))
        })
    })
}
