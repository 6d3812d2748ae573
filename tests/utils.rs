#![allow(missing_docs)]
#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, Utc};
use idv_relay::AuthorizationRequest;
use idv_relay::state::Session;
use rstest::fixture;
pub use test_relay::{ProviderImpl, init_tracer};

#[fixture]
pub fn provider() -> ProviderImpl {
    init_tracer();
    ProviderImpl::new()
}

pub fn in_minutes(minutes: i64) -> DateTime<Utc> {
    Utc::now() + TimeDelta::try_minutes(minutes).expect("should be in range")
}

pub fn in_millis(millis: i64) -> DateTime<Utc> {
    Utc::now() + TimeDelta::try_milliseconds(millis).expect("should be in range")
}

/// Save a pending session under `id`, expiring at `expires_at`.
pub async fn seed_session(provider: &ProviderImpl, id: &str, expires_at: DateTime<Utc>) -> Session {
    let request = AuthorizationRequest {
        id: format!("message-{id}"),
        thid: format!("thread-{id}"),
        ..AuthorizationRequest::default()
    };
    let session = Session::pending(id, request);
    provider.sessions.put(id, &session, expires_at).await.expect("should save session");
    session
}
