//! Conversions from external infrastructure errors into WalletKit errors.

use reqwest::Error as HttpError;
use walletkit_core::{DispatchError, TransportError};
use walletkit_domain::WalletKitError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct InfraError(pub WalletKitError);

impl From<InfraError> for WalletKitError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<WalletKitError> for InfraError {
    fn from(value: WalletKitError) -> Self {
        Self(value)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → WalletKitError */
/* -------------------------------------------------------------------------- */

/// Short description of a failed HTTP exchange, without the request URL
pub(crate) fn describe_http_error(err: &HttpError) -> String {
    if err.is_timeout() {
        return "HTTP request timed out".to_string();
    }
    if err.is_connect() {
        return "HTTP connection failure".to_string();
    }
    if err.is_builder() {
        return format!("invalid HTTP request: {}", without_url(err));
    }
    if err.is_body() || err.is_decode() {
        return "failed to read HTTP response body".to_string();
    }
    without_url(err)
}

fn without_url(err: &HttpError) -> String {
    let text = err.to_string();
    match err.url() {
        Some(url) => text.replace(url.as_str(), "<url>"),
        None => text,
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_builder() {
            return Self(WalletKitError::Config(describe_http_error(&value)));
        }
        Self(WalletKitError::Network(describe_http_error(&value)))
    }
}

/// Transport-level failure: no response was obtained
pub(crate) fn transport_error(err: &HttpError) -> TransportError {
    TransportError::Failed(describe_http_error(err))
}

/// Dispatch-level failure of an adapter call that got no response
pub(crate) fn dispatch_error(err: &HttpError) -> DispatchError {
    DispatchError::transport(describe_http_error(err))
}

/* -------------------------------------------------------------------------- */
/* url::ParseError → WalletKitError */
/* -------------------------------------------------------------------------- */

impl From<url::ParseError> for InfraError {
    fn from(value: url::ParseError) -> Self {
        Self(WalletKitError::Config(format!("invalid URL: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
