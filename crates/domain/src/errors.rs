//! Error types used outside of the dispatch path

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised while setting up a session or its adapters
///
/// Failures on the dispatch path are `DispatchError`s instead.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum WalletKitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Result type alias for WalletKit operations
pub type Result<T> = std::result::Result<T, WalletKitError>;
