//! # Callback Endpoint
//!
//! The holder's wallet posts its signed proof token to this endpoint, keyed
//! by the session identifier embedded in the request's callback URL.
//!
//! The token is verified against the request originally issued for the
//! session. On success the session is resolved to the subject identity the
//! proof names. On failure the session is left exactly as it was, so the
//! wallet may retry with a corrected token.
//!
//! A session that has already been resolved is verified again on
//! resubmission. A token naming the same subject refreshes the session's
//! expiry; one naming a different subject is rejected and the first
//! resolution stands. A session that expires while its token is being
//! verified stays expired.

use std::future::Future;

use chrono::Utc;
use tracing::instrument;

use crate::endpoint::Handler;
use crate::provider::{Metadata, Provider, StateStore, Verifier};
use crate::state::Session;
use crate::types::{CallbackRequest, CallbackResponse};
use crate::{Error, Result, server};

/// Verify a proof token for a session and resolve the session on success.
///
/// # Errors
///
/// Returns `SessionNotFound` if no live session has the identifier and
/// `VerificationFailed` if the token is rejected or verification does not
/// complete before the configured deadline.
#[instrument(level = "debug", skip(provider))]
pub async fn callback(provider: impl Provider, request: CallbackRequest) -> Result<CallbackResponse> {
    let session = verify(&provider, &request).await?;
    process(&provider, &request, session).await
}

impl Handler for CallbackRequest {
    type Response = CallbackResponse;

    fn handle(self, provider: &impl Provider) -> impl Future<Output = Result<Self::Response>> + Send {
        callback(provider.clone(), self)
    }
}

// Look up the session the token responds to.
async fn verify(provider: &impl Provider, request: &CallbackRequest) -> Result<Session> {
    tracing::debug!("callback::verify");

    load(provider, &request.session_id).await
}

// Fetch the live session for `session_id`.
async fn load(provider: &impl Provider, session_id: &str) -> Result<Session> {
    let session = StateStore::get::<Session>(provider, session_id)
        .await
        .map_err(|e| server!("issue retrieving session: {e}"))?;
    session.ok_or_else(|| {
        Error::SessionNotFound(format!("auth request was not found for session ID: {session_id}"))
    })
}

async fn process(
    provider: &impl Provider, request: &CallbackRequest, mut session: Session,
) -> Result<CallbackResponse> {
    tracing::debug!("callback::process");

    let meta = Metadata::relay(provider)
        .await
        .map_err(|e| server!("issue loading relay metadata: {e}"))?;

    let verification = Verifier::verify(
        provider,
        &request.token,
        &session.request,
        &meta.resolvers,
        &meta.options,
    );
    let subject = match tokio::time::timeout(meta.verify_timeout, verification).await {
        Ok(Ok(subject)) => subject,
        Ok(Err(e)) => {
            tracing::warn!(session_id = %session.id, "proof verification failed: {e}");
            return Err(Error::VerificationFailed(e.to_string()));
        }
        Err(_) => {
            tracing::warn!(session_id = %session.id, "proof verification timed out");
            return Err(Error::VerificationFailed("verification timed out".to_string()));
        }
    };

    // the write lands only while the stored session is unchanged and live
    loop {
        if let Some(resolved) = session.subject() {
            if resolved != subject {
                return Err(Error::VerificationFailed(
                    "session is already resolved for a different subject".to_string(),
                ));
            }
        }

        let resolved = session.clone().resolve(&subject);
        let expiry = Utc::now() + meta.session_ttl;
        let swapped = StateStore::swap(provider, &request.session_id, &session, &resolved, expiry)
            .await
            .map_err(|e| server!("issue saving session: {e}"))?;
        if swapped {
            break;
        }

        tracing::debug!(session_id = %request.session_id, "session changed during verification");
        session = load(provider, &request.session_id).await?;
    }

    tracing::info!(session_id = %request.session_id, subject = %subject, "session resolved");

    Ok(CallbackResponse { id: subject })
}
