//! Token-refreshing dispatcher
//!
//! Adds the expired-access-token recovery flow on top of the base dispatch
//! engine. Requests failing with an expired token are parked in the shared
//! queue while a single refresh runs; on success the session credentials are
//! updated in place and the queue is replayed, on failure every parked
//! request receives the refresh error.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{debug, info};
use walletkit_common::error::log_classified;
use walletkit_domain::{Credentials, DispatcherConfig, RequestDescriptor, RECENT_REFRESH_WINDOW_SECS};

use super::classifier::DispatchError;
use super::engine::{ClockSync, DispatchEngine};
use super::pending::{PendingRequest, ResponseHandle};
use super::state::RefreshWaiter;
use super::ports::{
    TimeDifferenceObserver, TimeProvider, TokenProvider, TokenRefreshObserver, Transport,
};
use super::{RequestDispatcher, SharedCredentials};

/// Token-refresh collaborators of a dispatch engine
pub(crate) struct TokenRefresher {
    provider: Arc<dyn TokenProvider>,
    credentials: SharedCredentials,
    observer: Option<Arc<dyn TokenRefreshObserver>>,
    recent_refresh_window: Duration,
}

impl TokenRefresher {
    fn has_recently_refreshed(&self) -> bool {
        self.credentials.read().has_recently_refreshed(self.recent_refresh_window, Utc::now())
    }

    fn refresh_token(&self) -> Option<String> {
        self.credentials.read().refresh_token.clone()
    }
}

/// Arguments of one refresh-grant exchange
struct RefreshGrant {
    refresh_token: String,
    code: Option<String>,
    scopes: Option<Vec<String>>,
}

impl DispatchEngine {
    pub(crate) fn handle_expired_access_token(
        self: &Arc<Self>,
        request: PendingRequest,
        error: DispatchError,
    ) {
        let Some(refresher) = &self.token else {
            request.reject(error);
            return;
        };

        let mut state = self.state.lock();
        if refresher.has_recently_refreshed() {
            debug!(request_id = %request.id(), "token refreshed moments ago, re-dispatching");
            self.admit(&mut state, request);
            return;
        }

        if state.token_refresh_in_progress {
            state.pending.push_back(request);
            return;
        }

        let Some(refresh_token) = refresher.refresh_token() else {
            drop(state);
            let missing = DispatchError::missing_refresh_token();
            log_classified("token_refresh", &missing);
            request.reject(missing);
            return;
        };

        state.pending.push_back(request);
        state.token_refresh_in_progress = true;
        drop(state);

        info!(trigger = %error.kind(), "access token expired, refreshing");
        self.spawn_refresh(
            Arc::clone(&refresher.provider),
            RefreshGrant { refresh_token, code: None, scopes: None },
        );
    }

    /// Refresh on demand
    ///
    /// A plain refresh joins the exchange already running. One carrying a
    /// `code` or `scopes` waits for it to finish and then runs its own
    /// exchange with the refresh token that exchange left behind.
    pub(crate) async fn refresh_token(
        self: &Arc<Self>,
        mut code: Option<String>,
        mut scopes: Option<Vec<String>>,
    ) -> Result<Credentials, DispatchError> {
        let Some(refresher) = &self.token else {
            return Err(DispatchError::missing_refresh_token());
        };
        let extends_grant = code.is_some() || scopes.is_some();

        loop {
            let (waiter, outcome) = oneshot::channel();
            let started = {
                let mut state = self.state.lock();
                if state.token_refresh_in_progress {
                    debug!(extends_grant, "token refresh already running, waiting for it");
                    state.refresh_waiters.push(waiter);
                    false
                } else {
                    let Some(refresh_token) = refresher.refresh_token() else {
                        return Err(DispatchError::missing_refresh_token());
                    };
                    state.token_refresh_in_progress = true;
                    state.refresh_waiters.push(waiter);
                    drop(state);

                    info!(with_code = code.is_some(), "refreshing access token on request");
                    self.spawn_refresh(
                        Arc::clone(&refresher.provider),
                        RefreshGrant { refresh_token, code: code.take(), scopes: scopes.take() },
                    );
                    true
                }
            };

            let result = outcome.await.unwrap_or_else(|_| Err(DispatchError::cancelled()));
            if started || !extends_grant || result.is_err() {
                return result;
            }
        }
    }

    fn spawn_refresh(self: &Arc<Self>, provider: Arc<dyn TokenProvider>, grant: RefreshGrant) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let result = provider
                .refresh_token(&grant.refresh_token, grant.code.as_deref(), grant.scopes.as_deref())
                .await;
            engine.finish_refresh(result);
        });
    }

    fn finish_refresh(self: &Arc<Self>, result: Result<Credentials, DispatchError>) {
        let Some(refresher) = &self.token else {
            return;
        };

        match result {
            Ok(refreshed) => {
                let (updated, waiters) = {
                    let mut state = self.state.lock();
                    let updated = {
                        let mut credentials = refresher.credentials.write();
                        credentials.update_from(&refreshed);
                        credentials.clone()
                    };
                    state.token_refresh_in_progress = false;
                    self.replay(&mut state);
                    (updated, std::mem::take(&mut state.refresh_waiters))
                };

                info!(expires_in = ?updated.expires_in, "access token refreshed");
                if let Some(observer) = &refresher.observer {
                    observer.on_token_refreshed(&updated);
                }
                for waiter in waiters {
                    notify_waiter(waiter, Ok(updated.clone()));
                }
            }
            Err(error) => {
                let (queued, waiters) = {
                    let mut state = self.state.lock();
                    state.token_refresh_in_progress = false;
                    (state.take_pending(), std::mem::take(&mut state.refresh_waiters))
                };

                log_classified("token_refresh", &error);
                if error.is_refresh_token_expired() {
                    if let Some(observer) = &refresher.observer {
                        observer.on_refresh_token_invalid(&error);
                    }
                }
                for request in queued {
                    request.reject(error.clone());
                }
                for waiter in waiters {
                    notify_waiter(waiter, Err(error.clone()));
                }
            }
        }
    }
}

fn notify_waiter(waiter: RefreshWaiter, outcome: Result<Credentials, DispatchError>) {
    if waiter.send(outcome).is_err() {
        tracing::trace!("refresh caller dropped before settlement");
    }
}

/// Dispatcher that recovers from stale timestamps and expired access tokens
///
/// The session credentials are shared with the transport through
/// [`SharedCredentials`]; a refresh rewrites them in place so replayed
/// requests go out with the new token.
#[derive(Clone)]
pub struct RefreshingDispatcher {
    engine: Arc<DispatchEngine>,
    credentials: SharedCredentials,
}

impl RefreshingDispatcher {
    /// Start building a dispatcher around `transport` and `token_provider`
    pub fn builder(
        transport: Arc<dyn Transport>,
        token_provider: Arc<dyn TokenProvider>,
        credentials: SharedCredentials,
    ) -> RefreshingDispatcherBuilder {
        RefreshingDispatcherBuilder {
            transport,
            token_provider,
            credentials,
            time_provider: None,
            time_observer: None,
            refresh_observer: None,
            recent_refresh_window: Duration::from_secs(RECENT_REFRESH_WINDOW_SECS),
        }
    }

    /// Exchange the refresh token for new credentials
    ///
    /// `code` and `scopes` extend the grant when given; such a call always
    /// reaches the token provider, after any refresh already running. A
    /// plain call joins the running refresh instead.
    ///
    /// # Errors
    /// Fails immediately when the session holds no refresh token; otherwise
    /// returns the token provider's error.
    pub async fn refresh_token(
        &self,
        code: Option<String>,
        scopes: Option<Vec<String>>,
    ) -> Result<Credentials, DispatchError> {
        self.engine.refresh_token(code, scopes).await
    }

    /// Snapshot of the current session credentials
    pub fn credentials(&self) -> Credentials {
        self.credentials.read().clone()
    }

    /// The live credentials handle shared with the transport
    pub fn shared_credentials(&self) -> SharedCredentials {
        Arc::clone(&self.credentials)
    }
}

impl RequestDispatcher for RefreshingDispatcher {
    fn submit(&self, request: RequestDescriptor) -> ResponseHandle {
        self.engine.submit(request)
    }

    fn cancel_all_operations(&self) {
        self.engine.cancel_all();
    }
}

/// Builder for [`RefreshingDispatcher`]
pub struct RefreshingDispatcherBuilder {
    transport: Arc<dyn Transport>,
    token_provider: Arc<dyn TokenProvider>,
    credentials: SharedCredentials,
    time_provider: Option<Arc<dyn TimeProvider>>,
    time_observer: Option<Arc<dyn TimeDifferenceObserver>>,
    refresh_observer: Option<Arc<dyn TokenRefreshObserver>>,
    recent_refresh_window: Duration,
}

impl RefreshingDispatcherBuilder {
    /// Enable clock-sync recovery
    #[must_use]
    pub fn time_provider(mut self, provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = Some(provider);
        self
    }

    #[must_use]
    pub fn time_observer(mut self, observer: Arc<dyn TimeDifferenceObserver>) -> Self {
        self.time_observer = Some(observer);
        self
    }

    #[must_use]
    pub fn refresh_observer(mut self, observer: Arc<dyn TokenRefreshObserver>) -> Self {
        self.refresh_observer = Some(observer);
        self
    }

    /// Window within which an expired-token error re-dispatches without a refresh
    #[must_use]
    pub fn recent_refresh_window(mut self, window: Duration) -> Self {
        self.recent_refresh_window = window;
        self
    }

    /// Apply dispatcher settings from configuration
    #[must_use]
    pub fn config(self, config: &DispatcherConfig) -> Self {
        self.recent_refresh_window(config.recent_refresh_window())
    }

    pub fn build(self) -> RefreshingDispatcher {
        let clock = self
            .time_provider
            .map(|provider| ClockSync { provider, observer: self.time_observer });
        let refresher = TokenRefresher {
            provider: self.token_provider,
            credentials: Arc::clone(&self.credentials),
            observer: self.refresh_observer,
            recent_refresh_window: self.recent_refresh_window,
        };

        RefreshingDispatcher {
            engine: Arc::new(DispatchEngine::new(self.transport, clock, Some(refresher))),
            credentials: self.credentials,
        }
    }
}
