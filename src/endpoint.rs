//! # Endpoint
//!
//! `Endpoint` provides the entry point for relay requests. Requests are
//! routed to the appropriate handler for processing, returning a response
//! that can be serialized to a JSON object.

use std::fmt::Debug;
use std::future::Future;

use crate::provider::Provider;
use crate::Result;

/// Handle an incoming request.
///
/// # Errors
///
/// This method can fail for a number of reasons related to the incoming
/// request's viability. Expected failures include missing parameters,
/// unknown sessions, and rejected proofs.
///
/// Implementers should look to the Error type and description for more
/// information on the reason for failure.
pub async fn handle<T>(request: impl Handler<Response = T>, provider: &impl Provider) -> Result<T> {
    request.validate(provider).await?;
    request.handle(provider).await
}

/// Methods common to all requests.
///
/// The primary role of this trait is to provide a common interface for
/// requests so they can be handled by [`handle`] method.
pub trait Handler: Clone + Debug + Send + Sync {
    /// The inner reply type specific to the implementing request.
    type Response;

    /// Routes the request to the concrete handler used to process it.
    fn handle(self, provider: &impl Provider) -> impl Future<Output = Result<Self::Response>> + Send;

    /// Perform initial validation of the request.
    ///
    /// Validation undertaken here is common to all requests, with request-
    /// specific validation performed by the request's handler.
    fn validate(&self, _provider: &impl Provider) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}
