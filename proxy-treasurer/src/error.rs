//! Treasurer error taxonomy.

/// Failure modes surfaced by a [`crate::Treasurer`].
///
/// `onPaymentRequired` callers should treat every variant the same as a
/// `None` decline per the spec's "authorization failure due to transport
/// timeout is null with a logged reason" rule — these errors exist for
/// logging and testing, not for differentiated caller handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TreasurerError {
    /// The remote policy service's login round-trip failed.
    #[error("authentication with policy service failed: {0}")]
    AuthenticationFailed(String),

    /// The authorize call itself failed (network error, non-2xx, bad body).
    #[error("authorize request failed: {0}")]
    AuthorizeRequestFailed(String),

    /// The policy service's recommended index pointed outside `accepts`.
    #[error("policy service recommended an out-of-bounds requirement index")]
    RecommendationOutOfBounds,

    /// Signing the chosen requirement failed.
    #[error("wallet signing failed: {0}")]
    Wallet(#[from] proxy_wallet::WalletError),

    /// The wallet was configured with both EOA and smart-account credentials.
    #[error("invalid wallet configuration: {0}")]
    InvalidConfiguration(String),
}
