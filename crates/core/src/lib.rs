//! # WalletKit Core
//!
//! Request dispatch for the wallet API, independent of any HTTP stack.
//!
//! This crate contains:
//! - Port interfaces (transport, time provider, token provider, observers)
//! - The error classifier that turns error responses into [`DispatchError`]s
//! - [`BaseDispatcher`], which recovers from stale client clocks
//! - [`RefreshingDispatcher`], which additionally recovers from expired
//!   access tokens
//!
//! ## Architecture Principles
//! - Only depends on `walletkit-common` and `walletkit-domain`
//! - No HTTP code; adapters live in `walletkit-infra`
//! - All external collaborators via traits

pub mod dispatch;

// Re-export specific items to avoid ambiguity
pub use dispatch::classifier::{classify, ApiErrorPayload, DispatchError, DispatchErrorKind};
pub use dispatch::ports::{
    RawResponse, TimeDifferenceObserver, TimeProvider, TokenProvider, TokenRefreshObserver,
    Transport, TransportError,
};
pub use dispatch::{
    BaseDispatcher, BaseDispatcherBuilder, RefreshingDispatcher, RefreshingDispatcherBuilder,
    RequestDispatcher, ResponseHandle, SharedCredentials,
};
