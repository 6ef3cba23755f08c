//! # WalletKit Domain
//!
//! Domain types shared by every WalletKit crate.
//!
//! This crate contains:
//! - Session credentials and the request descriptor handed to transports
//! - Server information returned by the public API
//! - Configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other WalletKit crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use constants::*;
pub use errors::*;
pub use types::*;
