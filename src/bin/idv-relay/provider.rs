use chrono::{DateTime, Utc};
use idv_relay::AuthorizationRequest;
use idv_relay::jwz::{FsKeyLoader, JwzVerifier, ShapeCheck};
use idv_relay::provider::{
    Metadata, RelayMetadata, Resolvers, Result, StateStore, Verifier, VerifyOptions,
};
use idv_relay::store::Sessions;
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Clone, Debug)]
pub struct Provider {
    sessions: Sessions,
    metadata: RelayMetadata,
    verifier: JwzVerifier<FsKeyLoader, ShapeCheck>,
}

impl Provider {
    #[must_use]
    pub fn new(metadata: RelayMetadata, keys: FsKeyLoader) -> Self {
        Self {
            sessions: Sessions::new(),
            metadata,
            verifier: JwzVerifier::new(keys, ShapeCheck),
        }
    }
}

impl idv_relay::provider::Provider for Provider {}

impl Metadata for Provider {
    async fn relay(&self) -> Result<RelayMetadata> {
        Ok(self.metadata.clone())
    }
}

impl StateStore for Provider {
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

impl Verifier for Provider {
    async fn verify(
        &self, token: &str, request: &AuthorizationRequest, resolvers: &Resolvers,
        options: &VerifyOptions,
    ) -> Result<String> {
        self.verifier.verify(token, request, resolvers, options).await
    }
}
