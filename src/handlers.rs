//! # Handlers
//!
//! One module per relay endpoint.

pub mod auth_request;
pub mod callback;
pub mod status;
