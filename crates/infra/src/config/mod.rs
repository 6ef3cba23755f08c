//! Client configuration loading
//!
//! Reads [`walletkit_domain::Config`] from the environment (with `.env`
//! support) or from a JSON/TOML file.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
