//! Wallet error taxonomy.

/// Failure modes of [`crate::Wallet::create_payment`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WalletError {
    /// The requirement's `scheme` is not `"exact"`.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// The requirement failed basic validation (empty fields, bad address,
    /// unparseable amount) before signing was attempted.
    #[error("invalid payment requirements: {0}")]
    InvalidRequirements(String),

    /// EIP-712 signing itself failed (key error, signer I/O failure, etc.).
    #[error("signing failed: {0}")]
    SigningFailed(String),
}
