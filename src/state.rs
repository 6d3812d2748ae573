//! State is used by the relay to persist a session between issuing an
//! authorization request, verifying the wallet's response and polling for the
//! result.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::types::AuthorizationRequest;

/// The duration for which a state item is valid.
pub enum Expire {
    /// A session expires this long after it was last written.
    Session,
}

impl Expire {
    /// Returns the duration for which the state item is valid.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        match self {
            Self::Session => TimeDelta::try_minutes(60).unwrap_or_default(),
        }
    }
}

/// A session tracks one issued authorization request and its resolution.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Session {
    /// Session identifier.
    pub id: String,

    /// The request issued for this session. Kept after resolution so
    /// resubmitted tokens can be verified against it.
    pub request: AuthorizationRequest,

    /// Where the session is in its lifecycle.
    pub state: SessionState,
}

/// Session lifecycle. A session only ever moves from `Pending` to `Resolved`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for a verified response.
    Pending,

    /// A response was verified for `subject`.
    Resolved {
        /// Identity of the verified subject.
        subject: String,
    },
}

impl Session {
    /// Create a pending session for a newly issued request.
    #[must_use]
    pub fn pending(id: impl Into<String>, request: AuthorizationRequest) -> Self {
        Self {
            id: id.into(),
            request,
            state: SessionState::Pending,
        }
    }

    /// Resolve the session to `subject`.
    #[must_use]
    pub fn resolve(self, subject: impl Into<String>) -> Self {
        Self {
            state: SessionState::Resolved {
                subject: subject.into(),
            },
            ..self
        }
    }

    /// The verified subject, if the session has been resolved.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        match &self.state {
            SessionState::Pending => None,
            SessionState::Resolved { subject } => Some(subject),
        }
    }
}
