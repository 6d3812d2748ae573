//! # Configuration
//!
//! Relay configuration is read once at start-up from environment variables
//! (optionally seeded from a `.env` file) and a YAML file listing the state
//! resolver for each supported network.
//!
//! ```yaml
//! polygon:mumbai:
//!   networkURL: https://polygon-mumbai.example/rpc
//!   contractState: "0x134B1BE34911E39A8397ec6289782989729807a4"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use chrono::TimeDelta;
use serde_json::Value;

use crate::provider::{ProofQuery, RelayMetadata, Resolvers, Result, VerifyOptions};
use crate::state::Expire;

const DEFAULT_CONTRACT_ADDRESS: &str = "0x134B1BE34911E39A8397ec6289782989729807a4";
const DEFAULT_AUDIENCE: &str =
    "did:polygonid:polygon:mumbai:2qG7bhdJKsk4tSbShiXiF2Eti2cVjUH3iTDXyyn6i7";

/// Relay configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Address of the on-chain issuer contract.
    pub onchain_issuer_contract_address: String,

    /// Directory holding circuit verification keys.
    pub key_dir: PathBuf,

    /// Public base URL of the relay.
    pub host_url: String,

    /// Blockchain of the on-chain issuer, e.g. `polygon`.
    pub blockchain: String,

    /// Network of the on-chain issuer, e.g. `mumbai`.
    pub network: String,

    /// Identity of the verifier, sent as the audience of issued requests.
    pub audience: String,

    /// Reason shown to the holder.
    pub reason: String,

    /// The proof requested from holders.
    pub query: ProofQuery,

    /// Path of the resolver settings file.
    pub resolvers_file: PathBuf,

    /// State resolvers, keyed by `<blockchain>:<network>`.
    pub resolvers: Resolvers,

    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,

    /// Session expiry window.
    pub session_ttl: TimeDelta,

    /// How long a superseded identity state is still accepted.
    pub state_transition_delay: Duration,

    /// Deadline for a single verification call.
    pub verify_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment and the resolver settings
    /// file it names.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed, the resolver file
    /// cannot be read or parsed, or the configuration is inconsistent.
    pub fn from_env() -> Result<Self> {
        // a missing .env file is not an error
        let _ = dotenvy::dotenv();

        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.resolvers = load_resolvers(&config.resolvers_file)?;
        config.verify()?;
        Ok(config)
    }

    /// Build configuration from variables returned by `lookup`, applying
    /// defaults for anything unset. Resolvers are left empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let defaults = ProofQuery::default();
        let query = ProofQuery {
            circuit_id: var("PROOF_CIRCUIT_ID", &defaults.circuit_id),
            allowed_issuers: lookup("PROOF_ALLOWED_ISSUERS").map_or(defaults.allowed_issuers, |v| {
                v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
            }),
            context: var("PROOF_CONTEXT", &defaults.context),
            credential_type: var("PROOF_CREDENTIAL_TYPE", &defaults.credential_type),
            field: var("PROOF_FIELD", &defaults.field),
            value: lookup("PROOF_VALUE").map_or(defaults.value, Value::String),
        };

        Ok(Self {
            onchain_issuer_contract_address: var(
                "ONCHAIN_ISSUER_CONTRACT_ADDRESS",
                DEFAULT_CONTRACT_ADDRESS,
            ),
            key_dir: PathBuf::from(var("KEY_DIR", "./keys")),
            host_url: var("HOST_URL", "http://localhost:6543"),
            blockchain: var("ONCHAIN_ISSUER_CONTRACT_BLOCKCHAIN", "polygon"),
            network: var("ONCHAIN_ISSUER_CONTRACT_NETWORK", "mumbai"),
            audience: var("VERIFIER_AUDIENCE_DID", DEFAULT_AUDIENCE),
            reason: var("REQUEST_REASON", "test flow"),
            query,
            resolvers_file: PathBuf::from(var("RESOLVERS_FILE", "resolvers.settings.yaml")),
            resolvers: Resolvers::default(),
            listen_addr: parse(&lookup, "LISTEN_ADDR", "0.0.0.0:6543")?,
            session_ttl: session_ttl(&lookup)?,
            state_transition_delay: Duration::from_secs(parse(
                &lookup,
                "STATE_TRANSITION_DELAY_SECS",
                "300",
            )?),
            verify_timeout: Duration::from_secs(parse(&lookup, "VERIFY_TIMEOUT_SECS", "30")?),
        })
    }

    /// The resolver key of the configured blockchain and network.
    #[must_use]
    pub fn resolver_prefix(&self) -> String {
        format!("{}:{}", self.blockchain, self.network)
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if required values are empty or no resolver is
    /// configured for the configured blockchain and network.
    pub fn verify(&self) -> Result<()> {
        if self.blockchain.is_empty() {
            bail!("ONCHAIN_ISSUER_CONTRACT_BLOCKCHAIN is not set");
        }
        if self.network.is_empty() {
            bail!("ONCHAIN_ISSUER_CONTRACT_NETWORK is not set");
        }
        if self.host_url.is_empty() {
            bail!("HOST_URL is not set");
        }
        if self.session_ttl <= TimeDelta::zero() {
            bail!("SESSION_TTL_MINS must be positive");
        }
        if self.verify_timeout.is_zero() {
            bail!("VERIFY_TIMEOUT_SECS must be positive");
        }
        if self.resolvers.is_empty() {
            bail!("no resolvers configured");
        }
        let prefix = self.resolver_prefix();
        if self.resolvers.get(&prefix).is_none() {
            bail!("no resolver configured for {prefix}");
        }
        Ok(())
    }

    /// Relay metadata derived from this configuration.
    #[must_use]
    pub fn metadata(&self) -> RelayMetadata {
        RelayMetadata {
            audience: self.audience.clone(),
            host_url: self.host_url.clone(),
            reason: self.reason.clone(),
            query: self.query.clone(),
            resolvers: self.resolvers.clone(),
            options: VerifyOptions {
                accepted_state_transition_delay: self.state_transition_delay,
            },
            session_ttl: self.session_ttl,
            verify_timeout: self.verify_timeout,
        }
    }
}

fn parse<T>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = lookup(key).unwrap_or_else(|| default.to_string());
    value.parse().with_context(|| format!("invalid {key}: {value}"))
}

fn session_ttl(lookup: impl Fn(&str) -> Option<String>) -> Result<TimeDelta> {
    let Some(minutes) = lookup("SESSION_TTL_MINS") else {
        return Ok(Expire::Session.duration());
    };
    let minutes: i64 =
        minutes.parse().with_context(|| format!("invalid SESSION_TTL_MINS: {minutes}"))?;
    TimeDelta::try_minutes(minutes).ok_or_else(|| anyhow!("SESSION_TTL_MINS is out of range"))
}

/// Read resolver settings from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or its contents are invalid.
pub fn load_resolvers(path: impl AsRef<Path>) -> Result<Resolvers> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read resolver settings {}", path.display()))?;
    parse_resolvers(&content)
}

/// Parse resolver settings from YAML.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or an entry is missing its
/// network URL or state contract.
pub fn parse_resolvers(yaml: &str) -> Result<Resolvers> {
    let resolvers: Resolvers =
        serde_yaml::from_str(yaml).context("failed to parse resolver settings")?;

    for (network, resolver) in resolvers.iter() {
        if resolver.network_url.is_empty() {
            bail!("network url is not set for {network}");
        }
        if resolver.contract_state.is_empty() {
            bail!("contract state is not set for {network}");
        }
    }
    Ok(resolvers)
}
