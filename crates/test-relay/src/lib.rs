//! Test provider for the relay: the in-memory session store plus a
//! deterministic verifier.
//!
//! Tokens are plain strings. `valid:<did>` verifies as `<did>`, `slow:<did>`
//! verifies as `<did>` after [`SLOW_DELAY`], and anything else is rejected.

use std::sync::Once;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use idv_relay::AuthorizationRequest;
use idv_relay::provider::{
    Metadata, Provider, RelayMetadata, Resolver, Resolvers, StateStore, Verifier, VerifyOptions,
};
use idv_relay::store::Sessions;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const HOST_URL: &str = "http://localhost:6543";
pub const AUDIENCE: &str = "did:polygonid:polygon:mumbai:2qG7bhdJKsk4tSbShiXiF2Eti2cVjUH3iTDXyyn6i7";
pub const SUBJECT: &str = "did:polygonid:polygon:mumbai:2qFXmNqGWPrLqDowKz37Gq2FETk4yQwVUVUqeBLmf9";

/// How long a `slow:` token takes to verify.
pub const SLOW_DELAY: Duration = Duration::from_millis(500);

static INIT: Once = Once::new();

pub fn init_tracer() {
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::ERROR).finish();
        tracing::subscriber::set_global_default(subscriber).expect("subscriber set");
    });
}

/// A token the test verifier accepts for `subject`.
#[must_use]
pub fn valid_token(subject: &str) -> String {
    format!("valid:{subject}")
}

#[derive(Clone, Debug)]
pub struct ProviderImpl {
    pub sessions: Sessions,
    metadata: RelayMetadata,
}

impl Default for ProviderImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderImpl {
    #[must_use]
    pub fn new() -> Self {
        let resolvers = Resolvers::from_iter([(
            "polygon:mumbai".to_string(),
            Resolver {
                network_url: "https://polygon-mumbai.example/rpc".to_string(),
                contract_state: "0x134B1BE34911E39A8397ec6289782989729807a4".to_string(),
            },
        )]);

        Self {
            sessions: Sessions::new(),
            metadata: RelayMetadata {
                audience: AUDIENCE.to_string(),
                host_url: HOST_URL.to_string(),
                resolvers,
                ..RelayMetadata::default()
            },
        }
    }

    /// Use `timeout` as the verification deadline.
    #[must_use]
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.metadata.verify_timeout = timeout;
        self
    }
}

impl Provider for ProviderImpl {}

impl Metadata for ProviderImpl {
    async fn relay(&self) -> Result<RelayMetadata> {
        Ok(self.metadata.clone())
    }
}

impl StateStore for ProviderImpl {
    async fn put(&self, key: &str, state: impl Serialize + Send, dt: DateTime<Utc>) -> Result<()> {
        self.sessions.put(key, state, dt).await
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.sessions.get(key).await
    }

    async fn swap(
        &self, key: &str, current: impl Serialize + Send, state: impl Serialize + Send,
        dt: DateTime<Utc>,
    ) -> Result<bool> {
        self.sessions.swap(key, current, state, dt).await
    }
}

impl Verifier for ProviderImpl {
    async fn verify(
        &self, token: &str, _request: &AuthorizationRequest, resolvers: &Resolvers,
        _options: &VerifyOptions,
    ) -> Result<String> {
        if resolvers.is_empty() {
            return Err(anyhow!("no resolvers"));
        }
        if let Some(subject) = token.strip_prefix("valid:") {
            return Ok(subject.to_string());
        }
        if let Some(subject) = token.strip_prefix("slow:") {
            tokio::time::sleep(SLOW_DELAY).await;
            return Ok(subject.to_string());
        }
        Err(anyhow!("token is not a valid proof"))
    }
}
