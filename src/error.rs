//! # Relay Errors
//!
//! Errors surfaced by the relay's endpoints. Each error renders as a JSON
//! object with an `error` code and an `error_description`, ready to be
//! returned to the caller.

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Relay error codes.
#[derive(Error, Debug, Deserialize)]
pub enum Error {
    /// A payload could not be serialized or deserialized.
    #[error(r#"{{"error": "encoding_error", "error_description": "{0}"}}"#)]
    EncodingError(String),

    /// No live session exists for the identifier. The session was either
    /// never issued or has expired.
    #[error(r#"{{"error": "session_not_found", "error_description": "{0}"}}"#)]
    SessionNotFound(String),

    /// The request is missing a required parameter or its body could not be
    /// read.
    #[error(r#"{{"error": "invalid_request", "error_description": "{0}"}}"#)]
    BadRequest(String),

    /// The proof token was rejected, either by proof verification or by
    /// identity state resolution.
    #[error(r#"{{"error": "verification_failed", "error_description": "{0}"}}"#)]
    VerificationFailed(String),

    /// The relay encountered an unexpected condition that prevented it from
    /// fulfilling the request.
    #[error(r#"{{"error": "server_error", "error_description": "{0}"}}"#)]
    InternalError(String),
}

/// Error response body.
#[derive(Deserialize, Serialize)]
pub struct RelayError {
    /// Error code.
    pub error: String,

    /// Error description.
    pub error_description: String,
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RelayError {
            error: self.code().to_string(),
            error_description: self.message().to_string(),
        }
        .serialize(serializer)
    }
}

impl Error {
    /// The error code returned in the `error` field.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EncodingError(_) => "encoding_error",
            Self::SessionNotFound(_) => "session_not_found",
            Self::BadRequest(_) => "invalid_request",
            Self::VerificationFailed(_) => "verification_failed",
            Self::InternalError(_) => "server_error",
        }
    }

    /// The human-readable error description.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::EncodingError(d)
            | Self::SessionNotFound(d)
            | Self::BadRequest(d)
            | Self::VerificationFailed(d)
            | Self::InternalError(d) => d,
        }
    }

    /// Transform error to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Construct an `Error::BadRequest` error from a string or format args.
#[macro_export]
macro_rules! bad_request {
    ($($msg:tt)+) => {
        $crate::Error::BadRequest(format!($($msg)+))
    };
}

/// Construct an `Error::InternalError` error from a string or format args.
#[macro_export]
macro_rules! server {
    ($($msg:tt)+) => {
        $crate::Error::InternalError(format!($($msg)+))
    };
}
