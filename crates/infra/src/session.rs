//! Wallet session wiring
//!
//! Connects the HTTP adapters to a [`RefreshingDispatcher`]: the transport
//! authorizes with the session credentials, the public API client serves as
//! time provider and the OAuth client as token provider.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use walletkit_core::{
    DispatchError, RefreshingDispatcher, RequestDispatcher, ResponseHandle, SharedCredentials,
    TimeDifferenceObserver, TokenRefreshObserver,
};
use walletkit_domain::{Config, Credentials, RequestDescriptor, Result};

use crate::api::{endpoint, OAuthTokenClient, PublicApiClient};
use crate::http::HttpTransport;

/// Callbacks the application registers for a session
#[derive(Clone, Default)]
pub struct SessionObservers {
    /// Told the server-minus-local clock offset after every clock sync, so
    /// the application can correct the timestamps it signs
    pub time: Option<Arc<dyn TimeDifferenceObserver>>,
    /// Told about refreshed credentials (to persist them) and about a
    /// rejected refresh token (to re-authenticate)
    pub token: Option<Arc<dyn TokenRefreshObserver>>,
}

/// An authenticated wallet API session
#[derive(Clone)]
pub struct WalletSession {
    dispatcher: RefreshingDispatcher,
    api_base_url: String,
}

impl WalletSession {
    /// Build the adapters from `config` and start a session for `credentials`
    ///
    /// # Errors
    ///
    /// Returns `WalletKitError::Config` if an HTTP client cannot be built.
    pub fn connect(
        config: &Config,
        credentials: Credentials,
        observers: SessionObservers,
    ) -> Result<Self> {
        let shared: SharedCredentials = Arc::new(RwLock::new(credentials));

        let transport = HttpTransport::from_config(&config.api, Arc::clone(&shared))?;
        let public = PublicApiClient::from_config(&config.api)?;
        let oauth = OAuthTokenClient::from_config(&config.api)?;

        let mut builder =
            RefreshingDispatcher::builder(Arc::new(transport), Arc::new(oauth), shared)
                .time_provider(Arc::new(public))
                .config(&config.dispatcher);
        if let Some(observer) = observers.time {
            builder = builder.time_observer(observer);
        }
        if let Some(observer) = observers.token {
            builder = builder.refresh_observer(observer);
        }

        info!(base_url = %config.api.base_url, "wallet session connected");
        Ok(Self { dispatcher: builder.build(), api_base_url: config.api.base_url.clone() })
    }

    /// Absolute URL of `path` under the wallet API base URL
    pub fn url(&self, path: &str) -> String {
        endpoint(&self.api_base_url, path)
    }

    pub fn dispatcher(&self) -> &RefreshingDispatcher {
        &self.dispatcher
    }

    /// Snapshot of the current credentials
    pub fn credentials(&self) -> Credentials {
        self.dispatcher.credentials()
    }

    /// Refresh the access token now, optionally extending the grant
    ///
    /// # Errors
    ///
    /// See [`RefreshingDispatcher::refresh_token`].
    pub async fn refresh_token(
        &self,
        code: Option<String>,
        scopes: Option<Vec<String>>,
    ) -> std::result::Result<Credentials, DispatchError> {
        self.dispatcher.refresh_token(code, scopes).await
    }
}

impl RequestDispatcher for WalletSession {
    fn submit(&self, request: RequestDescriptor) -> ResponseHandle {
        self.dispatcher.submit(request)
    }

    fn cancel_all_operations(&self) {
        self.dispatcher.cancel_all_operations();
    }
}
