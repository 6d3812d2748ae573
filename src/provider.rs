//! # Provider
//!
//! Implementers supply storage, configuration, and proof verification to the
//! relay through the traits in this module. The relay itself holds no
//! process-wide state.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::state::Expire;
use crate::types::{AuthorizationRequest, ProofRequest};

/// Result is used for all external errors.
pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;

/// Relay Provider trait.
pub trait Provider: Metadata + StateStore + Verifier + Clone {}

/// The `Metadata` trait is used by implementers to provide relay
/// configuration to the library.
pub trait Metadata: Send + Sync {
    /// Relay configuration used when issuing requests and verifying responses.
    fn relay(&self) -> impl Future<Output = Result<RelayMetadata>> + Send;
}

/// `StateStore` is used to store and retrieve sessions between requests.
///
/// A `get` following a `put` or successful `swap` for the same key must
/// observe the write. Entries are removed only by expiry.
pub trait StateStore: Send + Sync {
    /// Store state using the provided key. The expiry parameter indicates
    /// when data can be expunged from the state store.
    fn put(
        &self, key: &str, state: impl Serialize + Send, expiry: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Retrieve data using the provided key. Returns `None` when no live
    /// entry exists.
    fn get<T: DeserializeOwned>(&self, key: &str)
        -> impl Future<Output = Result<Option<T>>> + Send;

    /// Atomically replace the state stored under `key` with `state`, but only
    /// while the live entry still holds `current`. Returns `false`, leaving
    /// the store untouched, if the entry has changed, expired or been
    /// removed since `current` was read.
    fn swap(
        &self, key: &str, current: impl Serialize + Send, state: impl Serialize + Send,
        expiry: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// `Verifier` checks a proof token against the request it answers.
///
/// Verification covers the zero-knowledge proofs in the token and the
/// on-chain identity state they commit to. Both are opaque to the relay.
pub trait Verifier: Send + Sync {
    /// Verify `token` against `request`, returning the identity of the
    /// subject that produced it.
    fn verify(
        &self, token: &str, request: &AuthorizationRequest, resolvers: &Resolvers,
        options: &VerifyOptions,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Configuration the relay needs to issue requests and verify responses.
#[derive(Clone, Debug)]
pub struct RelayMetadata {
    /// Identity of the verifier, used as the `from` of issued requests.
    pub audience: String,

    /// Public base URL of the relay. Callback URLs are built from it.
    pub host_url: String,

    /// Reason shown to the holder.
    pub reason: String,

    /// The proof requested from the holder.
    pub query: ProofQuery,

    /// State resolvers, keyed by `<blockchain>:<network>`.
    pub resolvers: Resolvers,

    /// Options passed through to the verifier.
    pub options: VerifyOptions,

    /// How long a session lives after its last write.
    pub session_ttl: TimeDelta,

    /// Deadline for a single verification call.
    pub verify_timeout: Duration,
}

impl RelayMetadata {
    /// The URL the wallet posts its response to for `session_id`.
    #[must_use]
    pub fn callback_url(&self, session_id: &str) -> String {
        format!("{}/api/v1/callback?sessionId={session_id}", self.host_url.trim_end_matches('/'))
    }
}

impl Default for RelayMetadata {
    fn default() -> Self {
        Self {
            audience: String::new(),
            host_url: String::new(),
            reason: "test flow".to_string(),
            query: ProofQuery::default(),
            resolvers: Resolvers::default(),
            options: VerifyOptions::default(),
            session_ttl: Expire::Session.duration(),
            verify_timeout: Duration::from_secs(30),
        }
    }
}

/// A proof query over a single credential: the holder must prove that
/// `credentialSubject.<field>` equals `value` in a credential of
/// `credential_type` issued by one of `allowed_issuers`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProofQuery {
    /// Circuit the proof must be generated with.
    pub circuit_id: String,

    /// Issuers whose credentials are accepted. `*` accepts any issuer.
    pub allowed_issuers: Vec<String>,

    /// JSON-LD context of the credential schema.
    pub context: String,

    /// Credential type.
    pub credential_type: String,

    /// Credential subject field the predicate applies to.
    pub field: String,

    /// Value the field must equal.
    pub value: Value,
}

impl Default for ProofQuery {
    fn default() -> Self {
        Self {
            circuit_id: "credentialAtomicQuerySigV2".to_string(),
            allowed_issuers: vec!["*".to_string()],
            context: "ipfs://QmfN3SaKgvTFGVN4cXFH8oWtvvwEdVQ9aeBQcS4ACPW6Z5".to_string(),
            credential_type: "Identification".to_string(),
            field: "filehash".to_string(),
            value: Value::String("12345678".to_string()),
        }
    }
}

impl ProofQuery {
    /// Build the proof request sent to the wallet.
    #[must_use]
    pub fn to_request(&self, id: u32) -> ProofRequest {
        ProofRequest {
            id,
            circuit_id: self.circuit_id.clone(),
            query: json!({
                "allowedIssuers": self.allowed_issuers,
                "credentialSubject": {
                    (self.field.clone()): {"$eq": self.value},
                },
                "context": self.context,
                "type": self.credential_type,
            }),
        }
    }
}

/// A binding from a network to the endpoint and contract used to read
/// published identity state.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Resolver {
    /// RPC endpoint of the network.
    #[serde(rename = "networkURL")]
    pub network_url: String,

    /// Address of the identity state contract.
    #[serde(rename = "contractState")]
    pub contract_state: String,
}

/// State resolvers keyed by `<blockchain>:<network>`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Resolvers(HashMap<String, Resolver>);

impl Resolvers {
    /// Create a resolver map.
    #[must_use]
    pub const fn new(resolvers: HashMap<String, Resolver>) -> Self {
        Self(resolvers)
    }

    /// The resolver for `prefix`, if configured.
    #[must_use]
    pub fn get(&self, prefix: &str) -> Option<&Resolver> {
        self.0.get(prefix)
    }

    /// Iterate over configured resolvers.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Resolver)> {
        self.0.iter()
    }

    /// The number of configured resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no resolvers are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Resolver)> for Resolvers {
    fn from_iter<I: IntoIterator<Item = (String, Resolver)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Options passed to the [`Verifier`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyOptions {
    /// How long a superseded identity state is still accepted. Tolerates
    /// propagation lag between the wallet's view of the ledger and ours.
    pub accepted_state_transition_delay: Duration,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            accepted_state_transition_delay: Duration::from_secs(5 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_query() {
        let request = ProofQuery::default().to_request(1);
        assert_eq!(request.circuit_id, "credentialAtomicQuerySigV2");
        assert_eq!(
            request.query,
            json!({
                "allowedIssuers": ["*"],
                "credentialSubject": {"filehash": {"$eq": "12345678"}},
                "context": "ipfs://QmfN3SaKgvTFGVN4cXFH8oWtvvwEdVQ9aeBQcS4ACPW6Z5",
                "type": "Identification",
            })
        );
    }

    #[test]
    fn callback_url() {
        let meta = RelayMetadata {
            host_url: "https://relay.example/".into(),
            ..RelayMetadata::default()
        };
        assert_eq!(meta.callback_url("42"), "https://relay.example/api/v1/callback?sessionId=42");
    }
}
