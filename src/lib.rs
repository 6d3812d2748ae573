//! A relay for verifying zero-knowledge credential proofs on behalf of a
//! relying party.
//!
//! The relay issues [iden3comm](https://iden3-communication.io) authorization
//! requests, receives the holder wallet's signed proof token on a callback
//! URL, verifies it, and lets the relying party poll for the verified subject
//! identity.
//!
//! Each request is tracked by a session:
//!
//! 1. [`issue_request`] creates a request and a pending session.
//! 2. [`callback`] verifies a proof token and resolves the session.
//! 3. [`status`] reports whether the session is unknown, pending or resolved.
//!
//! Storage, configuration and proof verification are supplied by the caller
//! through the traits in [`provider`]. [`http::router`] exposes the endpoints
//! over HTTP.

pub mod config;
pub mod core;
pub mod endpoint;
mod error;
mod handlers;
pub mod http;
pub mod jwz;
pub mod provider;
pub mod state;
pub mod store;
pub mod types;

pub use error::{Error, RelayError};
pub use handlers::auth_request::issue_request;
pub use handlers::callback::callback;
pub use handlers::status::status;
pub use types::*;

/// Result type used by relay endpoints.
pub type Result<T, E = Error> = std::result::Result<T, E>;
