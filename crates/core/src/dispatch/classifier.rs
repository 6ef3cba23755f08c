//! Error classifier
//!
//! Turns a failed response (status code plus body) into a [`DispatchError`].
//! The kind decides how the dispatcher reacts: stale timestamps start a
//! clock sync, expired access tokens start a token refresh, everything else
//! goes straight back to the caller.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use walletkit_common::error::{ErrorClassification, ErrorSeverity};

/// Error body returned by the wallet API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorPayload {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// How a failed request is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchErrorKind {
    /// The transport aborted the call; never retried
    Cancelled,
    /// Server rejected the request timestamp; recovered by a clock sync
    InvalidTimestamp,
    /// Access token expired; recovered by a token refresh
    ExpiredAccessToken,
    /// Refresh token rejected; the session cannot be recovered
    ExpiredRefreshToken,
    /// Any other failure, surfaced to the caller as is
    Generic,
}

impl DispatchErrorKind {
    /// Kind for an API error code
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "invalid_timestamp" => Self::InvalidTimestamp,
            "invalid_token" | "token_expired" => Self::ExpiredAccessToken,
            "invalid_grant" => Self::ExpiredRefreshToken,
            _ => Self::Generic,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::ExpiredAccessToken => "expired_access_token",
            Self::ExpiredRefreshToken => "expired_refresh_token",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for DispatchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure delivered to a caller awaiting a dispatched request
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} error{}: {message}", status_suffix(.status_code))]
pub struct DispatchError {
    kind: DispatchErrorKind,
    status_code: Option<u16>,
    code: Option<String>,
    description: Option<String>,
    message: String,
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code.map(|status| format!(" (status {status})")).unwrap_or_default()
}

impl DispatchError {
    /// Error built from a decoded API payload
    #[must_use]
    pub fn from_payload(payload: ApiErrorPayload, status_code: Option<u16>) -> Self {
        let kind = DispatchErrorKind::from_code(&payload.error);
        let message = match &payload.error_description {
            Some(description) => format!("{}: {description}", payload.error),
            None => payload.error.clone(),
        };

        Self {
            kind,
            status_code,
            code: Some(payload.error),
            description: payload.error_description,
            message,
        }
    }

    /// Fallback for error bodies that do not decode
    #[must_use]
    pub fn unrecognized(status_code: Option<u16>) -> Self {
        Self {
            kind: DispatchErrorKind::Generic,
            status_code,
            code: None,
            description: None,
            message: "unrecognized error response".to_string(),
        }
    }

    /// The transport aborted the call
    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            kind: DispatchErrorKind::Cancelled,
            status_code: None,
            code: None,
            description: None,
            message: "request cancelled".to_string(),
        }
    }

    /// No response was received at all
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: DispatchErrorKind::Generic,
            status_code: None,
            code: None,
            description: None,
            message: message.into(),
        }
    }

    /// Local failure of a refresh attempted without a refresh token
    #[must_use]
    pub fn missing_refresh_token() -> Self {
        Self {
            kind: DispatchErrorKind::Generic,
            status_code: None,
            code: Some("invalid_refresh_token".to_string()),
            description: Some("refresh token is not provided to user credentials".to_string()),
            message: "refresh token is not provided to user credentials".to_string(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> DispatchErrorKind {
        self.kind
    }

    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// API error code, when the body decoded
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == DispatchErrorKind::Cancelled
    }

    #[must_use]
    pub fn is_invalid_timestamp(&self) -> bool {
        self.kind == DispatchErrorKind::InvalidTimestamp
    }

    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        self.kind == DispatchErrorKind::ExpiredAccessToken
    }

    #[must_use]
    pub fn is_refresh_token_expired(&self) -> bool {
        self.kind == DispatchErrorKind::ExpiredRefreshToken
    }
}

/// Classify a failed response
///
/// `status_code` is `None` when the body did not come from an HTTP response
/// (for example a success body that failed to decode).
#[must_use]
pub fn classify(body: Option<&str>, status_code: Option<u16>) -> DispatchError {
    body.and_then(|text| serde_json::from_str::<ApiErrorPayload>(text).ok())
        .map_or_else(
            || DispatchError::unrecognized(status_code),
            |payload| DispatchError::from_payload(payload, status_code),
        )
}

impl ErrorClassification for DispatchError {
    fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DispatchErrorKind::InvalidTimestamp | DispatchErrorKind::ExpiredAccessToken
        )
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind {
            DispatchErrorKind::Cancelled => ErrorSeverity::Info,
            DispatchErrorKind::InvalidTimestamp | DispatchErrorKind::ExpiredAccessToken => {
                ErrorSeverity::Warning
            }
            DispatchErrorKind::Generic => ErrorSeverity::Error,
            DispatchErrorKind::ExpiredRefreshToken => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        self.kind == DispatchErrorKind::ExpiredRefreshToken
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}
