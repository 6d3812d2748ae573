//! # Authorization Request Endpoint
//!
//! This endpoint prepares an authorization request asking the holder's wallet
//! for a zero-knowledge proof over one of their credentials, and opens a
//! session to track the response.
//!
//! The request carries a callback URL embedding the session identifier. The
//! wallet posts its signed response there, out of band, after the holder
//! consents. Callers poll the status endpoint with the same identifier to
//! learn the outcome.
//!
//! # Example
//!
//! ```json
//! {
//!     "id": "f6a1c0a4-1f0e-4b57-a9b3-0e6f2a5d8c11",
//!     "typ": "application/iden3comm-plain-json",
//!     "type": "https://iden3-communication.io/authorization/1.0/request",
//!     "thid": "0b0e7d3e-47d5-4b4f-9c0e-6c3f1a2b9d84",
//!     "body": {
//!         "callbackUrl": "https://relay.example/api/v1/callback?sessionId=...",
//!         "reason": "test flow",
//!         "scope": [{
//!             "id": 1,
//!             "circuitId": "credentialAtomicQuerySigV2",
//!             "query": {
//!                 "allowedIssuers": ["*"],
//!                 "credentialSubject": {"filehash": {"$eq": "12345678"}},
//!                 "context": "ipfs://QmfN3SaKgvTFGVN4cXFH8oWtvvwEdVQ9aeBQcS4ACPW6Z5",
//!                 "type": "Identification"
//!             }
//!         }]
//!     },
//!     "from": "did:polygonid:polygon:mumbai:2qG7bhdJKsk4tSbShiXiF2Eti2cVjUH3iTDXyyn6i7"
//! }
//! ```

use std::future::Future;

use chrono::Utc;
use tracing::instrument;

use crate::core::generate;
use crate::endpoint::Handler;
use crate::provider::{Metadata, Provider, StateStore};
use crate::state::Session;
use crate::types::{
    AUTH_REQUEST_TYPE, AuthorizationRequest, AuthorizationRequestBody, IssueRequest, IssueResponse,
    PLAIN_MEDIA_TYPE,
};
use crate::{Result, server};

/// Issue an authorization request and open a pending session for it.
///
/// # Errors
///
/// Returns an error if relay metadata is unavailable or the session cannot be
/// saved.
#[instrument(level = "debug", skip(provider))]
pub async fn issue_request(provider: impl Provider, request: IssueRequest) -> Result<IssueResponse> {
    process(&provider).await
}

impl Handler for IssueRequest {
    type Response = IssueResponse;

    fn handle(self, provider: &impl Provider) -> impl Future<Output = Result<Self::Response>> + Send {
        issue_request(provider.clone(), self)
    }
}

async fn process(provider: &impl Provider) -> Result<IssueResponse> {
    tracing::debug!("issue_request::process");

    let meta = Metadata::relay(provider)
        .await
        .map_err(|e| server!("issue loading relay metadata: {e}"))?;

    let session_id = generate::session_id();
    let request = AuthorizationRequest {
        id: generate::message_id(),
        typ: PLAIN_MEDIA_TYPE.to_string(),
        type_: AUTH_REQUEST_TYPE.to_string(),
        thid: generate::thread_id(),
        body: AuthorizationRequestBody {
            callback_url: meta.callback_url(&session_id),
            reason: meta.reason.clone(),
            message: None,
            scope: vec![meta.query.to_request(1)],
        },
        from: meta.audience.clone(),
    };

    // save pending session, starting its expiry window
    let session = Session::pending(&session_id, request.clone());
    StateStore::put(provider, &session_id, &session, Utc::now() + meta.session_ttl)
        .await
        .map_err(|e| server!("issue saving session: {e}"))?;

    tracing::info!(session_id = %session_id, thid = %request.thid, "authorization request issued");

    Ok(IssueResponse { session_id, request })
}
