//! Public (unauthenticated) wallet API client
//!
//! Serves as the dispatcher's time provider: the server clock is read from
//! the public server-information endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use tracing::{debug, instrument};
use walletkit_core::{DispatchError, TimeProvider};
use walletkit_domain::{ApiConfig, ServerInformation, WalletKitError, SERVER_INFORMATION_PATH};

use super::{endpoint, read_json};
use crate::errors::conversions::dispatch_error;
use crate::http::client::client_for;

#[derive(Debug, Deserialize)]
struct ServerInformationResponse {
    /// Unix seconds
    time: i64,
}

/// Client for the public wallet API
#[derive(Clone)]
pub struct PublicApiClient {
    http: ReqwestClient,
    base_url: String,
}

impl PublicApiClient {
    pub fn new(http: ReqwestClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    /// Client for `config.public_base_url`
    ///
    /// # Errors
    ///
    /// Returns `WalletKitError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &ApiConfig) -> Result<Self, WalletKitError> {
        Ok(Self::new(client_for(config)?, config.public_base_url.clone()))
    }

    /// Fetch the server clock
    ///
    /// # Errors
    ///
    /// Returns the classified error body on a non-2xx response, or a generic
    /// error if the server is unreachable.
    #[instrument(skip(self))]
    pub async fn server_information(&self) -> Result<ServerInformation, DispatchError> {
        let url = endpoint(&self.base_url, SERVER_INFORMATION_PATH);
        debug!(url = %url, "GET server information");

        let response = self.http.get(&url).send().await.map_err(|err| dispatch_error(&err))?;
        let payload: ServerInformationResponse = read_json("server_information", response).await?;

        let server_time = DateTime::from_timestamp(payload.time, 0)
            .ok_or_else(|| DispatchError::transport("server time out of range"))?;
        let information = ServerInformation::from_server_time(server_time, Utc::now());

        debug!(time_diff_ms = information.time_diff.num_milliseconds(), "server clock read");
        Ok(information)
    }
}

#[async_trait]
impl TimeProvider for PublicApiClient {
    async fn server_information(&self) -> Result<ServerInformation, DispatchError> {
        Self::server_information(self).await
    }
}
