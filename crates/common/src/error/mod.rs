//! Error classification shared by WalletKit crates
//!
//! Every error type that crosses a crate boundary implements
//! [`ErrorClassification`] so callers can make retry and alerting decisions
//! without matching on concrete variants.
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Caller cancelled the request |
//! | **Warning** | Recoverable, handled internally | Stale timestamp, expired access token |
//! | **Error** | Failure surfaced to the caller | Rejected request, unreachable server |
//! | **Critical** | Session integrity lost | Refresh token no longer accepted |
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use walletkit_common::error::{ErrorClassification, ErrorSeverity};
//!
//! #[derive(Debug)]
//! struct Throttled;
//!
//! impl ErrorClassification for Throttled {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         ErrorSeverity::Warning
//!     }
//!
//!     fn is_critical(&self) -> bool {
//!         false
//!     }
//!
//!     fn retry_after(&self) -> Option<Duration> {
//!         Some(Duration::from_secs(1))
//!     }
//! }
//!
//! assert!(Throttled.is_retryable());
//! assert_eq!(Throttled.severity().to_string(), "WARN");
//! ```

use std::fmt;
use std::time::Duration;

/// Standard classification interface for errors
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: the same request may succeed once the
    /// condition behind them (stale clock, expired token) has been repaired.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for monitoring, alerting, and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Emit `error` through `tracing` at the level matching its severity
///
/// `context` names the operation that failed (e.g. `"clock_sync"`).
#[cfg(feature = "observability")]
pub fn log_classified<E>(context: &str, error: &E)
where
    E: ErrorClassification + fmt::Display + ?Sized,
{
    let retryable = error.is_retryable();
    match error.severity() {
        ErrorSeverity::Info => tracing::debug!(context, retryable, error = %error, "operation failed"),
        ErrorSeverity::Warning => {
            tracing::warn!(context, retryable, error = %error, "operation failed");
        }
        ErrorSeverity::Error | ErrorSeverity::Critical => {
            tracing::error!(context, retryable, severity = %error.severity(), error = %error, "operation failed");
        }
    }
}
