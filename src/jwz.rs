//! # JWZ Token Verification
//!
//! A JWZ token is the wallet's authorization response wrapped in a
//! zero-knowledge envelope: three base64url segments holding a protected
//! header, the response message, and a proof that the sender controls the
//! identity named in the message.
//!
//! [`JwzVerifier`] implements the relay's [`Verifier`] capability for JWZ
//! tokens. It checks the envelope and checks the response answers the
//! request it is verified against. It then hands every proof, along with
//! the verification key for its circuit, to a [`ProofBackend`]. Proof
//! arithmetic and identity state resolution live behind that trait.

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::provider::{Resolvers, Result, Verifier, VerifyOptions};
use crate::types::{AUTH_RESPONSE_TYPE, AuthorizationRequest};

/// JWZ protected header.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Header {
    /// Proving system, e.g. `groth16`.
    pub alg: String,

    /// Circuit used to prove the token.
    #[serde(rename = "circuitId")]
    pub circuit_id: String,

    /// Header parameters the recipient must understand.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub crit: Vec<String>,

    /// Media type of the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// A Groth16 proof.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Groth16Proof {
    /// Proof point A.
    pub pi_a: Vec<String>,

    /// Proof point B.
    pub pi_b: Vec<Vec<String>>,

    /// Proof point C.
    pub pi_c: Vec<String>,

    /// Proving protocol.
    #[serde(default)]
    pub protocol: String,

    /// Curve the proof is over.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub curve: String,
}

/// A zero-knowledge proof with its public signals.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ZkProof {
    /// The proof.
    pub proof: Groth16Proof,

    /// Public inputs and outputs of the circuit.
    pub pub_signals: Vec<String>,
}

/// The wallet's authorization response, carried as the JWZ payload.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AuthorizationResponse {
    /// Unique message identifier.
    pub id: String,

    /// Media type of the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Protocol message type.
    #[serde(rename = "type")]
    pub type_: String,

    /// Thread identifier copied from the request.
    pub thid: String,

    /// Identity of the responding subject.
    pub from: String,

    /// Identity the response is addressed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    /// Response body.
    pub body: AuthorizationResponseBody,
}

/// The body of an [`AuthorizationResponse`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AuthorizationResponseBody {
    /// Signed message, when the request asked for one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// One proof per requested scope.
    #[serde(default)]
    pub scope: Vec<ScopeProof>,
}

/// A proof answering one [`ProofRequest`](crate::types::ProofRequest).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ScopeProof {
    /// Identifier of the request answered.
    pub id: u32,

    /// Circuit the proof was generated with.
    #[serde(rename = "circuitId")]
    pub circuit_id: String,

    /// The proof and its public signals.
    #[serde(flatten)]
    pub zk: ZkProof,

    /// Optional verifiable presentation disclosed alongside the proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vp: Option<Value>,
}

/// A decoded JWZ token.
#[derive(Clone, Debug)]
pub struct Token {
    /// Protected header.
    pub header: Header,

    /// The authorization response.
    pub message: AuthorizationResponse,

    /// Proof over the token.
    pub proof: ZkProof,
}

impl Token {
    /// Decode a compact-serialized JWZ token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token does not have three segments, a segment
    /// is not base64url, or a segment does not hold the expected JSON.
    pub fn parse(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.trim().split('.').collect();
        let [header, payload, proof] = parts.as_slice() else {
            bail!("token must have 3 segments, found {}", parts.len());
        };

        let header: Header = decode(header).context("invalid token header")?;
        if header.alg.is_empty() {
            bail!("token header has no `alg`");
        }
        if header.circuit_id.is_empty() {
            bail!("token header has no `circuitId`");
        }

        Ok(Self {
            header,
            message: decode(payload).context("invalid token payload")?,
            proof: decode(proof).context("invalid token proof")?,
        })
    }
}

fn decode<T: DeserializeOwned>(segment: &str) -> Result<T> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).map_err(|e| anyhow!("{e}"))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Check `response` answers `request`.
///
/// # Errors
///
/// Returns an error describing the first mismatch found.
pub fn check_response(response: &AuthorizationResponse, request: &AuthorizationRequest) -> Result<()> {
    if response.type_ != AUTH_RESPONSE_TYPE {
        bail!("unexpected message type: {}", response.type_);
    }
    if response.thid != request.thid {
        bail!("response thread {} does not match request thread {}", response.thid, request.thid);
    }
    if response.from.is_empty() {
        bail!("response has no sender");
    }
    if let Some(to) = response.to.as_deref() {
        if !to.is_empty() && to != request.from {
            bail!("response is addressed to {to}");
        }
    }

    for requested in &request.body.scope {
        let Some(answered) = response.body.scope.iter().find(|s| s.id == requested.id) else {
            bail!("no proof for request {}", requested.id);
        };
        if answered.circuit_id != requested.circuit_id {
            bail!(
                "proof for request {} uses circuit {}, expected {}",
                requested.id,
                answered.circuit_id,
                requested.circuit_id
            );
        }
    }
    Ok(())
}

/// Checks zero-knowledge proofs, including resolving the identity state they
/// commit to.
pub trait ProofBackend: Send + Sync {
    /// Verify `proof` was generated with `circuit_id`.
    fn verify(
        &self, circuit_id: &str, verification_key: &[u8], proof: &ZkProof, resolvers: &Resolvers,
        options: &VerifyOptions,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Loads circuit verification keys.
pub trait KeyLoader: Send + Sync {
    /// Load the verification key for `circuit_id`.
    fn load(&self, circuit_id: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Loads verification keys from `<dir>/<circuitId>.json`.
#[derive(Clone, Debug)]
pub struct FsKeyLoader {
    dir: PathBuf,
}

impl FsKeyLoader {
    /// Create a loader reading keys from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl KeyLoader for FsKeyLoader {
    async fn load(&self, circuit_id: &str) -> Result<Vec<u8>> {
        // circuit ids arrive in the token, so never let one name a path
        if circuit_id.is_empty()
            || !circuit_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            bail!("invalid circuit id: {circuit_id}");
        }
        let path = self.dir.join(format!("{circuit_id}.json"));
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("no verification key for circuit {circuit_id}"))
    }
}

/// Checks proofs are well-formed Groth16 proofs with public signals.
///
/// `ShapeCheck` performs no pairing check and resolves no identity state. It
/// stands in where those checks are delegated elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShapeCheck;

impl ProofBackend for ShapeCheck {
    async fn verify(
        &self, circuit_id: &str, verification_key: &[u8], proof: &ZkProof, _: &Resolvers,
        _: &VerifyOptions,
    ) -> Result<()> {
        if verification_key.is_empty() {
            bail!("empty verification key for circuit {circuit_id}");
        }

        let p = &proof.proof;
        if !p.protocol.is_empty() && p.protocol != "groth16" {
            bail!("unsupported proving protocol: {}", p.protocol);
        }
        if p.pi_a.len() != 3 || p.pi_c.len() != 3 {
            bail!("malformed proof for circuit {circuit_id}");
        }
        if p.pi_b.len() != 3 || p.pi_b.iter().any(|point| point.len() != 2) {
            bail!("malformed proof for circuit {circuit_id}");
        }

        if proof.pub_signals.is_empty() {
            bail!("no public signals for circuit {circuit_id}");
        }
        if proof.pub_signals.iter().any(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_digit())) {
            bail!("public signals for circuit {circuit_id} are not field elements");
        }
        Ok(())
    }
}

/// Verifies JWZ tokens.
#[derive(Clone, Debug)]
pub struct JwzVerifier<K, B> {
    keys: K,
    backend: B,
}

impl<K: KeyLoader, B: ProofBackend> JwzVerifier<K, B> {
    /// Create a verifier loading keys with `keys` and checking proofs with
    /// `backend`.
    pub const fn new(keys: K, backend: B) -> Self {
        Self { keys, backend }
    }

    async fn check_proof(
        &self, circuit_id: &str, proof: &ZkProof, resolvers: &Resolvers, options: &VerifyOptions,
    ) -> Result<()> {
        let key = self.keys.load(circuit_id).await?;
        self.backend.verify(circuit_id, &key, proof, resolvers, options).await
    }
}

impl<K: KeyLoader, B: ProofBackend> Verifier for JwzVerifier<K, B> {
    async fn verify(
        &self, token: &str, request: &AuthorizationRequest, resolvers: &Resolvers,
        options: &VerifyOptions,
    ) -> Result<String> {
        tracing::debug!("JwzVerifier::verify");

        let token = Token::parse(token)?;
        check_response(&token.message, request)?;

        // proof of control over the sender identity
        self.check_proof(&token.header.circuit_id, &token.proof, resolvers, options)
            .await
            .context("token proof rejected")?;

        for scope in &token.message.body.scope {
            self.check_proof(&scope.circuit_id, &scope.zk, resolvers, options)
                .await
                .with_context(|| format!("proof for request {} rejected", scope.id))?;
        }

        Ok(token.message.from)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::provider::ProofQuery;
    use crate::types::AuthorizationRequestBody;

    const SUBJECT: &str = "did:polygonid:polygon:mumbai:2qFroxB5kwgCxgVrNGUM6EW3khJgCdHHnKTr3VnTcp";

    #[derive(Clone, Default)]
    struct StaticKeys(HashMap<String, Vec<u8>>);

    impl KeyLoader for StaticKeys {
        async fn load(&self, circuit_id: &str) -> Result<Vec<u8>> {
            self.0.get(circuit_id).cloned().ok_or_else(|| anyhow!("no key for {circuit_id}"))
        }
    }

    fn keys() -> StaticKeys {
        StaticKeys(HashMap::from([
            ("authV2".to_string(), b"{}".to_vec()),
            ("credentialAtomicQuerySigV2".to_string(), b"{}".to_vec()),
        ]))
    }

    fn request() -> AuthorizationRequest {
        AuthorizationRequest {
            id: "req-1".into(),
            thid: "thread-1".into(),
            from: "did:example:verifier".into(),
            body: AuthorizationRequestBody {
                scope: vec![ProofQuery::default().to_request(1)],
                ..AuthorizationRequestBody::default()
            },
            ..AuthorizationRequest::default()
        }
    }

    fn proof() -> Value {
        json!({
            "proof": {
                "pi_a": ["1", "2", "1"],
                "pi_b": [["1", "2"], ["3", "4"], ["1", "0"]],
                "pi_c": ["5", "6", "1"],
                "protocol": "groth16",
                "curve": "bn128"
            },
            "pub_signals": ["1", "2", "3"]
        })
    }

    fn response(thid: &str, circuit_id: &str) -> Value {
        let mut scope = proof();
        scope["id"] = json!(1);
        scope["circuitId"] = json!(circuit_id);

        json!({
            "id": "resp-1",
            "typ": "application/iden3-zkp-json",
            "type": AUTH_RESPONSE_TYPE,
            "thid": thid,
            "from": SUBJECT,
            "to": "did:example:verifier",
            "body": {"scope": [scope]}
        })
    }

    fn encode(header: &Value, payload: &Value, proof: &Value) -> String {
        [header, payload, proof]
            .map(|v| Base64UrlUnpadded::encode_string(v.to_string().as_bytes()))
            .join(".")
    }

    fn header() -> Value {
        json!({
            "alg": "groth16",
            "circuitId": "authV2",
            "crit": ["circuitId"],
            "typ": "application/iden3-zkp-json"
        })
    }

    #[tokio::test]
    async fn verifies_subject() {
        let token = encode(&header(), &response("thread-1", "credentialAtomicQuerySigV2"), &proof());
        let verifier = JwzVerifier::new(keys(), ShapeCheck);

        let subject = verifier
            .verify(&token, &request(), &Resolvers::default(), &VerifyOptions::default())
            .await
            .expect("should verify");
        assert_eq!(subject, SUBJECT);
    }

    #[tokio::test]
    async fn rejects_thread_mismatch() {
        let token = encode(&header(), &response("thread-2", "credentialAtomicQuerySigV2"), &proof());
        let verifier = JwzVerifier::new(keys(), ShapeCheck);

        let err = verifier
            .verify(&token, &request(), &Resolvers::default(), &VerifyOptions::default())
            .await
            .expect_err("should reject");
        assert!(err.to_string().contains("does not match request thread"));
    }

    #[tokio::test]
    async fn rejects_wrong_circuit() {
        let token = encode(&header(), &response("thread-1", "credentialAtomicQueryMTPV2"), &proof());
        let verifier = JwzVerifier::new(keys(), ShapeCheck);

        let err = verifier
            .verify(&token, &request(), &Resolvers::default(), &VerifyOptions::default())
            .await
            .expect_err("should reject");
        assert!(err.to_string().contains("expected credentialAtomicQuerySigV2"));
    }

    #[tokio::test]
    async fn rejects_malformed_proof() {
        let mut bad = proof();
        bad["proof"]["pi_a"] = json!(["1"]);
        let token = encode(&header(), &response("thread-1", "credentialAtomicQuerySigV2"), &bad);
        let verifier = JwzVerifier::new(keys(), ShapeCheck);

        let err = verifier
            .verify(&token, &request(), &Resolvers::default(), &VerifyOptions::default())
            .await
            .expect_err("should reject");
        assert_eq!(err.to_string(), "token proof rejected");
    }

    #[tokio::test]
    async fn rejects_unknown_circuit_key() {
        let mut header = header();
        header["circuitId"] = json!("authV3");
        let token = encode(&header, &response("thread-1", "credentialAtomicQuerySigV2"), &proof());
        let verifier = JwzVerifier::new(keys(), ShapeCheck);

        let result = verifier
            .verify(&token, &request(), &Resolvers::default(), &VerifyOptions::default())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn garbled_token() {
        assert!(Token::parse("not-a-token").is_err());
        assert!(Token::parse("a.b.c").is_err());
    }

    #[test]
    fn missing_scope() {
        let mut message: AuthorizationResponse =
            serde_json::from_value(response("thread-1", "credentialAtomicQuerySigV2")).unwrap();
        message.body.scope.clear();

        let err = check_response(&message, &request()).expect_err("should reject");
        assert_eq!(err.to_string(), "no proof for request 1");
    }

    #[test]
    fn misaddressed_response() {
        let mut message: AuthorizationResponse =
            serde_json::from_value(response("thread-1", "credentialAtomicQuerySigV2")).unwrap();
        message.to = Some("did:example:other".into());

        assert!(check_response(&message, &request()).is_err());
    }

    #[tokio::test]
    async fn key_loader_rejects_paths() {
        let loader = FsKeyLoader::new("./keys");
        assert!(loader.load("../secrets").await.is_err());
        assert!(loader.load("").await.is_err());
    }

    #[tokio::test]
    async fn key_loader_missing_key() {
        let loader = FsKeyLoader::new("./no-such-key-dir");
        let err = loader.load("authV2").await.expect_err("should fail");
        assert_eq!(err.to_string(), "no verification key for circuit authV2");
    }
}
