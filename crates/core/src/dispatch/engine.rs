//! Shared dispatch engine
//!
//! Both public dispatchers wrap an `Arc<DispatchEngine>`. The engine owns
//! the transport, the optional recovery collaborators and the state mutex.
//! Every state transition happens inside `state.lock()`; network calls and
//! observer callbacks run after the guard is dropped.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walletkit_common::error::log_classified;
use walletkit_domain::{RequestDescriptor, ServerInformation};

use super::classifier::{classify, DispatchError, DispatchErrorKind};
use super::pending::{PendingRequest, ResponseHandle};
use super::ports::{TimeDifferenceObserver, TimeProvider, Transport, TransportError};
use super::refreshing::TokenRefresher;
use super::state::DispatchState;

/// Clock-sync collaborators
pub(crate) struct ClockSync {
    pub(crate) provider: Arc<dyn TimeProvider>,
    pub(crate) observer: Option<Arc<dyn TimeDifferenceObserver>>,
}

pub(crate) struct DispatchEngine {
    transport: Arc<dyn Transport>,
    clock: Option<ClockSync>,
    pub(crate) token: Option<TokenRefresher>,
    pub(crate) state: Mutex<DispatchState>,
}

impl DispatchEngine {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        clock: Option<ClockSync>,
        token: Option<TokenRefresher>,
    ) -> Self {
        Self { transport, clock, token, state: Mutex::new(DispatchState::default()) }
    }

    pub(crate) fn submit(self: &Arc<Self>, descriptor: RequestDescriptor) -> ResponseHandle {
        let (request, handle) = PendingRequest::new(descriptor);
        debug!(
            request_id = %request.id(),
            method = %request.descriptor().method,
            url = %request.descriptor().url,
            "request submitted"
        );
        self.dispatch(request);
        handle
    }

    pub(crate) fn dispatch(self: &Arc<Self>, request: PendingRequest) {
        let mut state = self.state.lock();
        self.admit(&mut state, request);
    }

    /// Queue `request` behind a running flow, or start its transport call
    ///
    /// Caller holds the state lock.
    pub(crate) fn admit(self: &Arc<Self>, state: &mut DispatchState, request: PendingRequest) {
        if let Some(request) = Self::gate(state, request) {
            let engine = Arc::clone(self);
            let cancellation = state.cancellation.clone();
            tokio::spawn(async move { engine.execute(request, cancellation).await });
        }
    }

    /// Park `request` while a recovery flow runs; hand it back otherwise
    fn gate(state: &mut DispatchState, request: PendingRequest) -> Option<PendingRequest> {
        if !state.is_recovering() {
            return Some(request);
        }
        debug!(
            request_id = %request.id(),
            queued = state.pending.len() + 1,
            "recovery in progress, request queued"
        );
        state.pending.push_back(request);
        None
    }

    async fn execute(self: Arc<Self>, request: PendingRequest, cancellation: CancellationToken) {
        let outcome = tokio::select! {
            biased;
            () = cancellation.cancelled() => Err(TransportError::Cancelled),
            result = self.transport.execute(request.descriptor()) => result,
        };

        match outcome {
            Ok(response) if response.is_success() => {
                debug!(request_id = %request.id(), status = response.status, "request succeeded");
                request.fulfill(response.body);
            }
            Ok(response) => {
                let error = classify(Some(&response.body), Some(response.status));
                debug!(
                    request_id = %request.id(),
                    status = response.status,
                    kind = %error.kind(),
                    "request failed"
                );
                self.handle_failure(request, error);
            }
            Err(TransportError::Cancelled) => {
                debug!(request_id = %request.id(), "request cancelled");
                request.reject(DispatchError::cancelled());
            }
            Err(TransportError::Failed(message)) => {
                let error = DispatchError::transport(message);
                log_classified("dispatch", &error);
                request.reject(error);
            }
        }
    }

    fn handle_failure(self: &Arc<Self>, request: PendingRequest, error: DispatchError) {
        match error.kind() {
            DispatchErrorKind::InvalidTimestamp => self.start_clock_sync(request, error),
            DispatchErrorKind::ExpiredAccessToken if self.token.is_some() => {
                self.handle_expired_access_token(request, error);
            }
            _ => {
                log_classified("dispatch", &error);
                request.reject(error);
            }
        }
    }

    fn start_clock_sync(self: &Arc<Self>, request: PendingRequest, error: DispatchError) {
        let Some(clock) = &self.clock else {
            debug!(request_id = %request.id(), "no time provider configured");
            request.reject(error);
            return;
        };

        let mut state = self.state.lock();
        state.pending.push_back(request);
        if state.clock_sync_in_progress {
            return;
        }
        state.clock_sync_in_progress = true;
        drop(state);

        info!("server rejected request timestamp, synchronizing clock");
        let provider = Arc::clone(&clock.provider);
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let result = provider.server_information().await;
            engine.finish_clock_sync(result);
        });
    }

    fn finish_clock_sync(self: &Arc<Self>, result: Result<ServerInformation, DispatchError>) {
        match result {
            Ok(information) => {
                info!(
                    time_diff_ms = information.time_diff.num_milliseconds(),
                    "clock synchronized"
                );
                if let Some(observer) = self.clock.as_ref().and_then(|clock| clock.observer.as_ref())
                {
                    observer.on_time_difference_refreshed(information.time_diff);
                }

                let mut state = self.state.lock();
                state.clock_sync_in_progress = false;
                self.replay(&mut state);
            }
            Err(error) => {
                log_classified("clock_sync", &error);
                let queued = {
                    let mut state = self.state.lock();
                    state.clock_sync_in_progress = false;
                    state.take_pending()
                };
                for request in queued {
                    request.reject(error.clone());
                }
            }
        }
    }

    /// Re-admit every queued request in FIFO order
    ///
    /// Requests re-queue if the other flow is still running. The rest run
    /// on one task whose transport calls start in queue order.
    pub(crate) fn replay(self: &Arc<Self>, state: &mut DispatchState) {
        let queued = state.take_pending();
        let runnable: Vec<PendingRequest> =
            queued.into_iter().filter_map(|request| Self::gate(state, request)).collect();
        if runnable.is_empty() {
            return;
        }

        debug!(count = runnable.len(), "replaying queued requests");
        let engine = Arc::clone(self);
        let cancellation = state.cancellation.clone();
        tokio::spawn(async move {
            let mut running: FuturesUnordered<_> = runnable
                .into_iter()
                .map(|request| Arc::clone(&engine).execute(request, cancellation.clone()))
                .collect();
            while running.next().await.is_some() {}
        });
    }

    pub(crate) fn cancel_all(&self) {
        let cancelled = {
            let mut state = self.state.lock();
            std::mem::take(&mut state.cancellation)
        };
        info!("cancelling in-flight requests");
        cancelled.cancel();
    }
}
