//! # WalletKit Infrastructure
//!
//! HTTP implementations of the dispatch ports defined in `walletkit-core`.
//!
//! This crate contains:
//! - [`HttpTransport`], the reqwest transport that authorizes with the
//!   session's current access token
//! - [`PublicApiClient`] (time provider) and [`OAuthTokenClient`] (token
//!   provider)
//! - Configuration loading from the environment or JSON/TOML files
//! - Tracing subscriber setup
//! - [`WalletSession`], which wires everything into a refreshing dispatcher
//!
//! ## Architecture
//! - Implements traits defined in `walletkit-core`
//! - Contains all "impure" code (network, environment, files)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod session;

// Re-export commonly used items
pub use api::{OAuthTokenClient, PublicApiClient};
pub use errors::InfraError;
pub use http::{HttpTransport, HttpTransportBuilder};
pub use observability::init_tracing;
pub use session::{SessionObservers, WalletSession};
