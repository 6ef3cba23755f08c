//! Port interfaces for request dispatch

use async_trait::async_trait;
use chrono::TimeDelta;
use walletkit_domain::{Credentials, RequestDescriptor, ServerInformation};

use super::classifier::DispatchError;

/// Status and body of a received HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    /// 2xx status
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to obtain any response from the server
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The call was aborted before a response arrived
    #[error("request cancelled")]
    Cancelled,

    /// Connection, TLS or timeout failure; no status code is available
    #[error("transport failure: {0}")]
    Failed(String),
}

/// Executes one HTTP call
///
/// Implementations must apply the session's *current* credentials on every
/// call; the dispatcher replays the same descriptor after a token refresh and
/// expects the new token to be used.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError>;
}

/// Reads the server clock
#[async_trait]
pub trait TimeProvider: Send + Sync {
    /// Fetch the server time and its offset from the local clock
    async fn server_information(&self) -> Result<ServerInformation, DispatchError>;
}

/// Exchanges a refresh token for a new credential set
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Run the refresh grant
    ///
    /// `code` and `scopes` are forwarded when the caller is extending the
    /// session's grant; both are `None` for a plain refresh.
    async fn refresh_token(
        &self,
        refresh_token: &str,
        code: Option<&str>,
        scopes: Option<&[String]>,
    ) -> Result<Credentials, DispatchError>;
}

/// Notified after every successful clock synchronization
pub trait TimeDifferenceObserver: Send + Sync {
    fn on_time_difference_refreshed(&self, diff: TimeDelta);
}

/// Notified about the outcome of token refreshes
pub trait TokenRefreshObserver: Send + Sync {
    /// Credentials were refreshed; `credentials` is the updated session state
    fn on_token_refreshed(&self, credentials: &Credentials);

    /// The refresh token was rejected; the session must be re-authenticated
    fn on_refresh_token_invalid(&self, error: &DispatchError);
}
