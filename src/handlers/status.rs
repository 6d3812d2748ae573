//! # Status Endpoint
//!
//! Report where a session is in its lifecycle: unknown (never issued, or
//! expired), pending a verified response, or resolved to a subject identity.
//!
//! Polling never modifies a session and does not extend its expiry.

use std::future::Future;

use tracing::instrument;

use crate::endpoint::Handler;
use crate::provider::{Provider, StateStore};
use crate::state::{Session, SessionState};
use crate::types::{StatusRequest, StatusResponse};
use crate::{Result, bad_request, server};

/// Look up the status of a session.
///
/// # Errors
///
/// Returns `BadRequest` if no session identifier is provided and
/// `InternalError` if the stored session cannot be read.
#[instrument(level = "debug", skip(provider))]
pub async fn status(provider: impl Provider, request: StatusRequest) -> Result<StatusResponse> {
    verify(&request)?;
    process(&provider, &request).await
}

impl Handler for StatusRequest {
    type Response = StatusResponse;

    fn handle(self, provider: &impl Provider) -> impl Future<Output = Result<Self::Response>> + Send {
        status(provider.clone(), self)
    }
}

fn verify(request: &StatusRequest) -> Result<()> {
    tracing::debug!("status::verify");

    if request.id.is_empty() {
        return Err(bad_request!("url parameter has invalid values"));
    }
    Ok(())
}

async fn process(provider: &impl Provider, request: &StatusRequest) -> Result<StatusResponse> {
    tracing::debug!("status::process");

    let session = StateStore::get::<Session>(provider, &request.id)
        .await
        .map_err(|e| server!("issue retrieving session: {e}"))?;

    let status = match session.map(|s| s.state) {
        None => StatusResponse::NotFound,
        Some(SessionState::Pending) => StatusResponse::Pending,
        Some(SessionState::Resolved { subject }) => StatusResponse::Resolved { id: subject },
    };
    Ok(status)
}
