//! # Core Utilities
//!
//! Helpers shared by the relay's endpoints.

pub mod generate;
