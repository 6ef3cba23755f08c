//! Wallet API adapters for the dispatcher's recovery ports
//!
//! - [`PublicApiClient`] reads the server clock (time provider)
//! - [`OAuthTokenClient`] runs the refresh-token grant (token provider)
//!
//! Both call unauthenticated endpoints directly, outside the dispatcher, and
//! report failures as classified [`DispatchError`]s.

pub mod auth;
pub mod client;

pub use auth::OAuthTokenClient;
pub use client::PublicApiClient;
use reqwest::Response;
use serde::de::DeserializeOwned;
use walletkit_common::error::log_classified;
use walletkit_core::{classify, DispatchError};

use crate::errors::conversions::dispatch_error;

/// Decode a 2xx body as `T`, or classify the error body
///
/// Failures are logged under `context` at their classified severity.
pub(crate) async fn read_json<T: DeserializeOwned>(
    context: &str,
    response: Response,
) -> Result<T, DispatchError> {
    let status = response.status();
    let decoded = match response.text().await {
        Err(err) => Err(dispatch_error(&err)),
        Ok(body) if !status.is_success() => Err(classify(Some(&body), Some(status.as_u16()))),
        Ok(body) => serde_json::from_str(&body).map_err(|_| classify(Some(&body), None)),
    };

    if let Err(error) = &decoded {
        log_classified(context, error);
    }
    decoded
}

/// `base` and `path` joined with exactly one slash
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
