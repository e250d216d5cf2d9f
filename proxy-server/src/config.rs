//! Process configuration for the proxy server.
//!
//! Every option is read from the environment (with `--long-flag` overrides
//! via [`clap`], matching the facilitator's env-first style). `envPrefix`
//! support is handled before [`AppConfig::parse`] runs: any environment key
//! carrying the configured prefix is re-inserted under its unprefixed name,
//! since `clap`'s own `env` attributes cannot themselves be prefixed at
//! runtime.

use std::net::IpAddr;
use std::sync::Arc;

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use clap::Parser;

use proxy_treasurer::{NaiveTreasurer, RemotePolicyTreasurer, Treasurer};
use proxy_wallet::{EoaWallet, SmartAccountWallet, Wallet};

/// Rhinestone's ownable-validator module address, identical across chains
/// via deterministic CREATE2 deployment. Used when `wallet.validatorAddress`
/// is not overridden.
const DEFAULT_VALIDATOR_ADDRESS: &str = "0x2483DA3A338895199E5e538530213157e931Bf06";

/// Base Sepolia, used when `wallet.chainId` is not overridden.
const DEFAULT_CHAIN_ID: u64 = 84532;

const DEFAULT_PORT: u16 = 8402;

/// Which wallet implementation to build. Mutually exclusive with itself in
/// the sense that only one variant's fields may be populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "kebab-case")]
pub enum WalletMode {
    /// Sign directly with an externally-owned account key.
    Eoa,
    /// Sign with a session key through an ERC-4337 smart account.
    SmartAccount,
}

/// Process-wide configuration, parsed from the environment at startup.
#[derive(Debug, Parser)]
#[command(name = "proxy-server", about = "x402 payment proxy for MCP servers")]
pub struct AppConfig {
    /// TCP listen port.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Bind address.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Explicit wallet mode. Inferred from supplied credentials when absent.
    #[arg(long, env = "WALLET_MODE")]
    pub wallet_mode: Option<WalletMode>,

    /// 0x-prefixed hex EOA private key (`eoa` mode).
    #[arg(long, env = "WALLET_PRIVATE_KEY")]
    pub wallet_private_key: Option<String>,

    /// Smart account address (`smart-account` mode).
    #[arg(long, env = "WALLET_SMART_ACCOUNT_ADDRESS")]
    pub wallet_smart_account_address: Option<String>,

    /// Session signer private key (`smart-account` mode).
    #[arg(long, env = "WALLET_SESSION_KEY_PRIVATE_KEY")]
    pub wallet_session_key_private_key: Option<String>,

    /// Ownable-validator module address (`smart-account` mode).
    #[arg(long, env = "WALLET_VALIDATOR_ADDRESS")]
    pub wallet_validator_address: Option<String>,

    /// EVM chain id payments are signed for.
    #[arg(long, env = "WALLET_CHAIN_ID", default_value_t = DEFAULT_CHAIN_ID)]
    pub wallet_chain_id: u64,

    /// Remote-policy authorization service base URL. If unset, the naive
    /// treasurer is used.
    #[arg(long, env = "TREASURER_POLICY_API_URL")]
    pub treasurer_policy_api_url: Option<String>,
}

/// Fatal configuration problems, surfaced at startup.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Both EOA and smart-account credentials were supplied.
    #[error(
        "conflicting wallet configuration: both EOA (wallet.privateKey) and \
         smart-account (wallet.smartAccountAddress / wallet.sessionKeyPrivateKey) \
         credentials were supplied"
    )]
    ConflictingWalletCredentials,

    /// A field required by the selected wallet mode was not supplied.
    #[error("missing required configuration key: {0}")]
    MissingWalletField(&'static str),

    /// A supplied field could not be parsed into the expected type.
    #[error("invalid value for {field}: {reason}")]
    InvalidWalletField {
        /// The dotted configuration key, e.g. `"wallet.privateKey"`.
        field: &'static str,
        /// Why the value could not be parsed.
        reason: String,
    },
}

/// Strips `ENV_PREFIX` off every environment variable that carries it,
/// re-inserting the unprefixed key/value pair, before [`AppConfig::parse`]
/// runs. Variables without the prefix are left untouched.
fn apply_env_prefix() {
    let Ok(prefix) = std::env::var("ENV_PREFIX") else {
        return;
    };
    if prefix.is_empty() {
        return;
    }

    let prefixed: Vec<(String, String)> = std::env::vars()
        .filter(|(key, _)| key != "ENV_PREFIX" && key.starts_with(&prefix))
        .collect();

    for (key, value) in prefixed {
        let stripped = key[prefix.len()..].to_owned();
        // SAFETY: runs once, synchronously, before any other thread is
        // spawned and before `AppConfig::parse` reads the environment.
        unsafe {
            std::env::set_var(stripped, value);
        }
    }
}

impl AppConfig {
    /// Loads configuration from the environment (applying `ENV_PREFIX`
    /// stripping first) and command-line overrides.
    #[must_use]
    pub fn load() -> Self {
        apply_env_prefix();
        Self::parse()
    }

    fn resolved_mode(&self) -> Result<WalletMode, ConfigError> {
        let has_eoa = self.wallet_private_key.is_some();
        let has_smart_account =
            self.wallet_smart_account_address.is_some() || self.wallet_session_key_private_key.is_some();

        if has_eoa && has_smart_account {
            return Err(ConfigError::ConflictingWalletCredentials);
        }

        Ok(self.wallet_mode.unwrap_or(if has_smart_account {
            WalletMode::SmartAccount
        } else {
            WalletMode::Eoa
        }))
    }

    /// Builds the configured wallet.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConflictingWalletCredentials`] if both EOA and
    /// smart-account credentials are present, [`ConfigError::MissingWalletField`]
    /// if the resolved mode is missing a required field, or
    /// [`ConfigError::InvalidWalletField`] if a supplied value does not parse.
    pub fn build_wallet(&self) -> Result<Arc<dyn Wallet>, ConfigError> {
        match self.resolved_mode()? {
            WalletMode::Eoa => {
                let key = self
                    .wallet_private_key
                    .as_deref()
                    .ok_or(ConfigError::MissingWalletField("wallet.privateKey"))?;
                let signer: PrivateKeySigner = key.parse().map_err(|e| ConfigError::InvalidWalletField {
                    field: "wallet.privateKey",
                    reason: format!("{e}"),
                })?;
                Ok(Arc::new(EoaWallet::new(signer, self.wallet_chain_id)))
            }
            WalletMode::SmartAccount => {
                let session_key = self
                    .wallet_session_key_private_key
                    .as_deref()
                    .ok_or(ConfigError::MissingWalletField("wallet.sessionKeyPrivateKey"))?;
                let signer: PrivateKeySigner =
                    session_key.parse().map_err(|e| ConfigError::InvalidWalletField {
                        field: "wallet.sessionKeyPrivateKey",
                        reason: format!("{e}"),
                    })?;

                let smart_account_str = self
                    .wallet_smart_account_address
                    .as_deref()
                    .ok_or(ConfigError::MissingWalletField("wallet.smartAccountAddress"))?;
                let smart_account: Address =
                    smart_account_str.parse().map_err(|e| ConfigError::InvalidWalletField {
                        field: "wallet.smartAccountAddress",
                        reason: format!("{e}"),
                    })?;

                let validator_str = self
                    .wallet_validator_address
                    .as_deref()
                    .unwrap_or(DEFAULT_VALIDATOR_ADDRESS);
                let validator_address: Address =
                    validator_str.parse().map_err(|e| ConfigError::InvalidWalletField {
                        field: "wallet.validatorAddress",
                        reason: format!("{e}"),
                    })?;

                Ok(Arc::new(SmartAccountWallet::new(
                    signer,
                    smart_account,
                    validator_address,
                    self.wallet_chain_id,
                )))
            }
        }
    }

    /// Builds the configured treasurer around `wallet`.
    #[must_use]
    pub fn build_treasurer(&self, wallet: Arc<dyn Wallet>) -> Arc<dyn Treasurer> {
        match &self.treasurer_policy_api_url {
            Some(url) => Arc::new(RemotePolicyTreasurer::new(wallet, url.clone())),
            None => Arc::new(NaiveTreasurer::new(wallet)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, WalletMode};
    use clap::Parser;

    fn base_config() -> AppConfig {
        AppConfig::parse_from(["proxy-server"])
    }

    #[test]
    fn eoa_mode_requires_private_key() {
        let config = base_config();
        let result = config.build_wallet();
        assert!(matches!(result, Err(ConfigError::MissingWalletField("wallet.privateKey"))));
    }

    #[test]
    fn conflicting_credentials_are_rejected() {
        let mut config = base_config();
        config.wallet_private_key = Some("0x1111111111111111111111111111111111111111111111111111111111111111".to_owned());
        config.wallet_smart_account_address = Some("0x0000000000000000000000000000000000dEaD".to_owned());
        assert!(matches!(
            config.build_wallet(),
            Err(ConfigError::ConflictingWalletCredentials)
        ));
    }

    #[test]
    fn explicit_mode_overrides_inference() {
        let mut config = base_config();
        config.wallet_mode = Some(WalletMode::SmartAccount);
        let result = config.build_wallet();
        assert!(matches!(result, Err(ConfigError::MissingWalletField("wallet.sessionKeyPrivateKey"))));
    }

    #[test]
    fn valid_eoa_key_builds_wallet() {
        let mut config = base_config();
        let signer = alloy_signer_local::PrivateKeySigner::random();
        config.wallet_private_key = Some(signer.to_bytes().to_string());
        assert!(config.build_wallet().is_ok());
    }
}
