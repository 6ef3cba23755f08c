//! OAuth token endpoint client
//!
//! Runs the refresh-token grant for the refreshing dispatcher. Error bodies
//! go through the classifier, so a rejected refresh token (`invalid_grant`)
//! surfaces as an expired-refresh-token error.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use walletkit_core::{DispatchError, TokenProvider};
use walletkit_domain::{ApiConfig, Credentials, WalletKitError, TOKEN_PATH};

use super::{endpoint, read_json};
use crate::errors::conversions::dispatch_error;
use crate::http::client::client_for;

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    mac_key: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_credentials(self) -> Credentials {
        Credentials::issued(
            self.access_token,
            self.refresh_token,
            self.mac_key,
            self.expires_in,
            Utc::now(),
        )
    }
}

/// Client for the OAuth token endpoint
#[derive(Clone)]
pub struct OAuthTokenClient {
    http: ReqwestClient,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
}

impl OAuthTokenClient {
    /// Client posting to `{oauth_base_url}/token` as `client_id`
    pub fn new(http: ReqwestClient, oauth_base_url: &str, client_id: impl Into<String>) -> Self {
        Self {
            http,
            token_url: endpoint(oauth_base_url, TOKEN_PATH),
            client_id: client_id.into(),
            client_secret: None,
        }
    }

    /// Authenticate the client with HTTP basic auth
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// # Errors
    ///
    /// Returns `WalletKitError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &ApiConfig) -> Result<Self, WalletKitError> {
        let client = Self::new(client_for(config)?, &config.oauth_base_url, &config.client_id);
        Ok(match &config.client_secret {
            Some(secret) => client.with_client_secret(secret),
            None => client,
        })
    }

    fn grant_form(
        &self,
        refresh_token: &str,
        code: Option<&str>,
        scopes: Option<&[String]>,
    ) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
        ];
        if self.client_secret.is_none() {
            form.push(("client_id", self.client_id.clone()));
        }
        if let Some(code) = code {
            form.push(("code", code.to_string()));
        }
        if let Some(scopes) = scopes.filter(|scopes| !scopes.is_empty()) {
            form.push(("scope", scopes.join(" ")));
        }
        form
    }

    /// Exchange `refresh_token` for a new credential set
    ///
    /// # Errors
    ///
    /// Returns the classified error body on a non-2xx response, or a generic
    /// error if the endpoint is unreachable.
    #[instrument(skip(self, refresh_token), fields(with_code = code.is_some()))]
    pub async fn refresh(
        &self,
        refresh_token: &str,
        code: Option<&str>,
        scopes: Option<&[String]>,
    ) -> Result<Credentials, DispatchError> {
        debug!(url = %self.token_url, "POST refresh token grant");

        let mut request =
            self.http.post(&self.token_url).form(&self.grant_form(refresh_token, code, scopes));
        if let Some(secret) = &self.client_secret {
            request = request.basic_auth(&self.client_id, Some(secret));
        }

        let response = request.send().await.map_err(|err| dispatch_error(&err))?;
        let token: TokenResponse = read_json("oauth_token", response).await?;

        info!(expires_in = ?token.expires_in, "token endpoint issued new credentials");
        Ok(token.into_credentials())
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenClient {
    async fn refresh_token(
        &self,
        refresh_token: &str,
        code: Option<&str>,
        scopes: Option<&[String]>,
    ) -> Result<Credentials, DispatchError> {
        self.refresh(refresh_token, code, scopes).await
    }
}
