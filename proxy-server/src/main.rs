//! x402 payment proxy for Model Context Protocol servers.
//!
//! # Environment Variables
//!
//! - `PORT` — listen port (default `8402`)
//! - `HOST` — bind address (default `127.0.0.1`)
//! - `ENV_PREFIX` — prefix stripped from every other variable before it is read
//! - `WALLET_MODE`, `WALLET_PRIVATE_KEY`, `WALLET_SMART_ACCOUNT_ADDRESS`,
//!   `WALLET_SESSION_KEY_PRIVATE_KEY`, `WALLET_VALIDATOR_ADDRESS`, `WALLET_CHAIN_ID`
//! - `TREASURER_POLICY_API_URL`
//! - `RUST_LOG` — log level filter (default `info`)

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = proxy_server::run().await {
        tracing::error!("Proxy failed: {e}");
        std::process::exit(1);
    }
}
