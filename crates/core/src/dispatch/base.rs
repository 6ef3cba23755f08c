//! Base dispatcher: submit, execute and clock-sync recovery

use std::sync::Arc;

use walletkit_domain::RequestDescriptor;

use super::engine::{ClockSync, DispatchEngine};
use super::pending::ResponseHandle;
use super::ports::{TimeDifferenceObserver, TimeProvider, Transport};
use super::RequestDispatcher;

/// Dispatcher that recovers from stale request timestamps
///
/// Without a time provider every failure, including an invalid timestamp,
/// goes straight back to the caller.
#[derive(Clone)]
pub struct BaseDispatcher {
    engine: Arc<DispatchEngine>,
}

impl BaseDispatcher {
    /// Dispatcher with no recovery collaborators
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::builder(transport).build()
    }

    pub fn builder(transport: Arc<dyn Transport>) -> BaseDispatcherBuilder {
        BaseDispatcherBuilder { transport, time_provider: None, time_observer: None }
    }
}

impl RequestDispatcher for BaseDispatcher {
    fn submit(&self, request: RequestDescriptor) -> ResponseHandle {
        self.engine.submit(request)
    }

    fn cancel_all_operations(&self) {
        self.engine.cancel_all();
    }
}

/// Builder for [`BaseDispatcher`]
pub struct BaseDispatcherBuilder {
    transport: Arc<dyn Transport>,
    time_provider: Option<Arc<dyn TimeProvider>>,
    time_observer: Option<Arc<dyn TimeDifferenceObserver>>,
}

impl BaseDispatcherBuilder {
    /// Enable clock-sync recovery
    #[must_use]
    pub fn time_provider(mut self, provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = Some(provider);
        self
    }

    /// Receive the server/local clock offset after each sync
    ///
    /// Ignored unless a time provider is configured.
    #[must_use]
    pub fn time_observer(mut self, observer: Arc<dyn TimeDifferenceObserver>) -> Self {
        self.time_observer = Some(observer);
        self
    }

    pub fn build(self) -> BaseDispatcher {
        let clock = self
            .time_provider
            .map(|provider| ClockSync { provider, observer: self.time_observer });

        BaseDispatcher { engine: Arc::new(DispatchEngine::new(self.transport, clock, None)) }
    }
}
