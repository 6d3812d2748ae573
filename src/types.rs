//! # Types
//!
//! Wire types for the authorization handshake and the request/response
//! types of each relay endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Media type of an unencrypted, unsigned protocol message.
pub const PLAIN_MEDIA_TYPE: &str = "application/iden3comm-plain-json";

/// Protocol message type of an authorization request.
pub const AUTH_REQUEST_TYPE: &str = "https://iden3-communication.io/authorization/1.0/request";

/// Protocol message type of an authorization response.
pub const AUTH_RESPONSE_TYPE: &str = "https://iden3-communication.io/authorization/1.0/response";

/// An authorization request sent to the holder's wallet. The request asks the
/// holder to prove, in zero knowledge, one or more statements about their
/// credentials and to post the proof to `body.callback_url`.
///
/// Once issued, a request is never modified.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Unique message identifier.
    pub id: String,

    /// Media type of the message.
    pub typ: String,

    /// Protocol message type.
    #[serde(rename = "type")]
    pub type_: String,

    /// Thread identifier. The wallet's response must carry the same value.
    pub thid: String,

    /// Request body.
    pub body: AuthorizationRequestBody,

    /// Identity of the verifier issuing the request (the audience).
    pub from: String,
}

/// The body of an [`AuthorizationRequest`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationRequestBody {
    /// Where the wallet posts its signed response.
    #[serde(rename = "callbackUrl")]
    pub callback_url: String,

    /// Reason for the request, shown to the holder.
    pub reason: String,

    /// Optional message the holder is asked to sign.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Proofs requested from the holder.
    pub scope: Vec<ProofRequest>,
}

/// A single zero-knowledge proof request.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProofRequest {
    /// Request identifier, unique within the message.
    pub id: u32,

    /// Circuit the proof must be generated with.
    #[serde(rename = "circuitId")]
    pub circuit_id: String,

    /// The query to prove. Passed through to the wallet as-is.
    pub query: Value,
}

/// Request a new authorization request (and session) be issued.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IssueRequest;

/// A newly issued authorization request.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IssueResponse {
    /// Identifier of the session tracking the request.
    pub session_id: String,

    /// The request to forward to the holder's wallet.
    pub request: AuthorizationRequest,
}

/// A proof token posted by the holder's wallet for a session.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CallbackRequest {
    /// Session the token responds to.
    pub session_id: String,

    /// The signed proof token.
    pub token: String,
}

/// The result of a successfully verified callback.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CallbackResponse {
    /// Identity of the verified subject.
    pub id: String,
}

/// Request the status of a session.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StatusRequest {
    /// Session identifier.
    pub id: String,
}

/// The status of a session.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusResponse {
    /// No live session has the identifier.
    NotFound,

    /// The request has been issued but no verified response received.
    Pending,

    /// A response has been verified.
    Resolved {
        /// Identity of the verified subject.
        id: String,
    },
}
