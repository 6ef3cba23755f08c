use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Client as ReqwestClient, Method};
use tracing::{debug, instrument};
use walletkit_core::{RawResponse, SharedCredentials, Transport, TransportError};
use walletkit_domain::{
    ApiConfig, HttpMethod, RequestDescriptor, WalletKitError, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_USER_AGENT,
};

use crate::errors::conversions::transport_error;
use crate::errors::InfraError;

/// reqwest-backed [`Transport`] for wallet API calls.
///
/// Every call reads the access token from the shared credentials at send
/// time, so a request replayed after a token refresh carries the new token.
/// Failures are returned as is; recovery belongs to the dispatcher.
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    credentials: Option<SharedCredentials>,
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Transport with the timeout and user agent from `config`.
    pub fn from_config(
        config: &ApiConfig,
        credentials: SharedCredentials,
    ) -> Result<Self, WalletKitError> {
        Self::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .credentials(credentials)
            .build()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let mut builder = self.client.request(method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if request.header(AUTHORIZATION.as_str()).is_none() {
            if let Some(credentials) = &self.credentials {
                let access_token = credentials.read().access_token.clone();
                builder = builder.bearer_auth(access_token);
            }
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!("sending HTTP request");
        let response = builder.send().await.map_err(|err| {
            debug!(error = %err, "HTTP request failed");
            transport_error(&err)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| transport_error(&err))?;
        debug!(status, "received HTTP response");

        Ok(RawResponse::new(status, body))
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
    credentials: Option<SharedCredentials>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            default_headers: None,
            credentials: None,
        }
    }
}

impl HttpTransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Authorize every call with the current access token.
    pub fn credentials(mut self, credentials: SharedCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn build(self) -> Result<HttpTransport, WalletKitError> {
        let client =
            build_client(self.timeout, self.user_agent.as_deref(), self.default_headers)?;
        Ok(HttpTransport { client, credentials: self.credentials })
    }
}

/// Plain reqwest client for the unauthenticated adapters.
pub(crate) fn client_for(config: &ApiConfig) -> Result<ReqwestClient, WalletKitError> {
    build_client(config.timeout(), Some(&config.user_agent), None)
}

fn build_client(
    timeout: Duration,
    user_agent: Option<&str>,
    default_headers: Option<HeaderMap>,
) -> Result<ReqwestClient, WalletKitError> {
    let mut builder = ReqwestClient::builder().timeout(timeout).no_proxy();

    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent);
    }

    if let Some(headers) = default_headers {
        builder = builder.default_headers(headers);
    }

    builder.build().map_err(|err| WalletKitError::from(InfraError::from(err)))
}
