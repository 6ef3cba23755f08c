//! Domain types and models

pub mod credentials;
pub mod request;
pub mod server;

pub use credentials::Credentials;
pub use request::{HttpMethod, RequestDescriptor};
pub use server::ServerInformation;
