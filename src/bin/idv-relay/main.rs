//! # Identity Verification Relay
//!
//! Serves the relay endpoints over HTTP. Configuration is read from the
//! environment (see [`idv_relay::config`]); log output is controlled with
//! `RUST_LOG`.

mod provider;

use std::process;

use idv_relay::config::Config;
use idv_relay::jwz::FsKeyLoader;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::provider::Provider;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {e:#}");
            process::exit(1);
        }
    };
    tracing::info!(
        contract = %config.onchain_issuer_contract_address,
        network = %config.resolver_prefix(),
        audience = %config.audience,
        "relay configured"
    );
    tracing::warn!(
        "zero-knowledge proofs are checked for shape only, pairing and state checks are delegated"
    );

    let provider = Provider::new(config.metadata(), FsKeyLoader::new(&config.key_dir));

    let router = idv_relay::http::router(provider);

    let listener = TcpListener::bind(config.listen_addr).await.expect("should bind");
    tracing::info!("listening on {}", listener.local_addr().expect("local_addr should be set"));
    axum::serve(listener, router).with_graceful_shutdown(shutdown()).await.expect("should run");
}

async fn shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        return;
    }
    tracing::info!("shutting down");
}
