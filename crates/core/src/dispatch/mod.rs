//! Request dispatch with transparent recovery
//!
//! Callers submit a [`RequestDescriptor`] and get back a [`ResponseHandle`]
//! immediately. The dispatcher executes the call on a Tokio task; if the
//! server answers with a recoverable error it runs the matching recovery
//! flow and replays the request, so the caller only sees the final outcome.
//!
//! - [`BaseDispatcher`] recovers from stale request timestamps by asking a
//!   [`TimeProvider`](ports::TimeProvider) for the server clock.
//! - [`RefreshingDispatcher`] additionally refreshes an expired access token
//!   through a [`TokenProvider`](ports::TokenProvider).
//!
//! Requests that fail while a recovery flow is running wait in a single
//! FIFO queue shared by both flows, and at most one flow of each kind runs
//! at a time.
//!
//! ```no_run
//! # async fn demo(transport: std::sync::Arc<dyn walletkit_core::Transport>) {
//! use walletkit_core::{BaseDispatcher, RequestDispatcher};
//! use walletkit_domain::RequestDescriptor;
//!
//! let dispatcher = BaseDispatcher::new(transport);
//! let body = dispatcher.submit(RequestDescriptor::get("https://api.test/wallet/1")).await;
//! # let _ = body;
//! # }
//! ```

pub mod classifier;
pub mod ports;

mod base;
mod engine;
mod pending;
mod refreshing;
mod state;

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use walletkit_domain::{Credentials, RequestDescriptor};

pub use base::{BaseDispatcher, BaseDispatcherBuilder};
use classifier::{classify, DispatchError};
pub use pending::ResponseHandle;
pub use refreshing::{RefreshingDispatcher, RefreshingDispatcherBuilder};

/// Session credentials shared between a dispatcher and its transport
pub type SharedCredentials = Arc<RwLock<Credentials>>;

/// Submits requests and resolves them once every recovery has run
pub trait RequestDispatcher: Send + Sync {
    /// Start executing `request` and return its handle right away
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, since the transport call
    /// is spawned onto the current runtime.
    fn submit(&self, request: RequestDescriptor) -> ResponseHandle;

    /// Cancel every in-flight transport call
    ///
    /// Affected requests resolve with a cancelled error. Requests waiting
    /// in the recovery queue are not touched.
    fn cancel_all_operations(&self);

    /// Submit `request` and decode the success body as JSON
    ///
    /// A body that does not decode as `T` is classified like an error body
    /// with no status code.
    fn submit_json<T>(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<T, DispatchError>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
        Self: Sized,
    {
        let handle = self.submit(request);
        async move {
            let body = handle.await?;
            serde_json::from_str(&body).map_err(|_| classify(Some(&body), None))
        }
    }
}
