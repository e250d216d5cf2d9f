//! ERC-3009 `transferWithAuthorization` EIP-712 signing.

use alloy_primitives::{Address, FixedBytes, U256, eip712_domain};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolStruct, sol};
use rand::{Rng, rng};

use proxy_core::{Eip3009Authorization, ExactPayload, PaymentRequirements, UnixTimestamp};

use crate::error::WalletError;

sol! {
    /// Solidity-compatible struct used for the EIP-712 signing hash. Field
    /// order and casing must match the on-chain `transferWithAuthorization`
    /// ABI exactly. `pub(crate)` so callers can reconstruct and verify the
    /// digest a signature was produced against.
    #[derive(Debug)]
    pub(crate) struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

/// Clock-skew grace period subtracted from `now` to produce `validAfter`.
pub const VALID_AFTER_GRACE_SECONDS: u64 = 600;

/// EIP-712 domain name/version for the asset being transferred. Supplied via
/// [`PaymentRequirements::extra`]; USDC deployments use `{"USDC", "2"}`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainExtra {
    /// EIP-712 domain `name`, e.g. `"USDC"`.
    #[serde(default)]
    pub name: String,
    /// EIP-712 domain `version`, e.g. `"2"`.
    #[serde(default)]
    pub version: String,
}

/// Any signer capable of producing an EIP-712 signature over a precomputed
/// digest. Lets [`sign_erc3009_authorization`] work over both raw
/// [`PrivateKeySigner`]s and session-key signers for smart accounts, without
/// requiring `Signer` to be implemented for `Arc<T>`.
pub trait SignerLike {
    /// The address whose authority this signer speaks for.
    fn address(&self) -> Address;

    /// Signs a 32-byte digest, returning a 65-byte `r || s || v` signature.
    fn sign_hash(
        &self,
        hash: &FixedBytes<32>,
    ) -> impl std::future::Future<Output = Result<[u8; 65], WalletError>> + Send;
}

impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<[u8; 65], WalletError> {
        let signature = Signer::sign_hash(self, hash)
            .await
            .map_err(|e| WalletError::SigningFailed(e.to_string()))?;
        Ok(signature.as_bytes())
    }
}

/// Builds the EIP-712 domain, signs the `transferWithAuthorization` digest
/// with `signer`, and assembles the ERC-3009 [`ExactPayload`].
///
/// `from` is the authorization's payer address — the account funds move out
/// of on-chain. For a plain EOA wallet this is the signer's own address; for
/// a smart-account wallet it is the smart account, signed for by a session
/// key that is a different address entirely. It must be passed in rather
/// than derived from `signer.address()` so the digest that gets signed is
/// the same digest a verifier reconstructs from the wire payload's `from`.
///
/// # Errors
///
/// Returns [`WalletError::InvalidRequirements`] if `requirements` is missing
/// an address field or an unparseable amount, and
/// [`WalletError::SigningFailed`] if the underlying signer call fails.
pub async fn sign_erc3009_authorization<S: SignerLike + Sync>(
    signer: &S,
    from: Address,
    chain_id: u64,
    requirements: &PaymentRequirements,
) -> Result<ExactPayload, WalletError> {
    let asset_address: Address = requirements
        .asset
        .parse()
        .map_err(|e| WalletError::InvalidRequirements(format!("invalid asset address: {e}")))?;
    let pay_to: Address = requirements
        .pay_to
        .parse()
        .map_err(|e| WalletError::InvalidRequirements(format!("invalid payTo address: {e}")))?;
    let amount: U256 = requirements
        .max_amount_required_atomic()
        .map_err(|e| WalletError::InvalidRequirements(format!("invalid amount: {e}")))?
        .try_into()
        .map_err(|_| WalletError::InvalidRequirements("amount overflows U256".to_owned()))?;

    let domain_extra: DomainExtra = requirements
        .extra
        .as_ref()
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or(DomainExtra {
            name: String::new(),
            version: String::new(),
        });

    let domain = eip712_domain! {
        name: domain_extra.name,
        version: domain_extra.version,
        chain_id: chain_id,
        verifying_contract: asset_address,
    };

    let now = UnixTimestamp::now();
    let valid_after = now - VALID_AFTER_GRACE_SECONDS;
    let valid_before = now + requirements.max_timeout_seconds;

    let nonce_bytes: [u8; 32] = rng().random();
    let nonce = FixedBytes(nonce_bytes);

    let transfer_with_authorization = TransferWithAuthorization {
        from,
        to: pay_to,
        value: amount,
        validAfter: U256::from(valid_after.as_secs()),
        validBefore: U256::from(valid_before.as_secs()),
        nonce,
    };

    let eip712_hash = transfer_with_authorization.eip712_signing_hash(&domain);
    let signature = signer.sign_hash(&eip712_hash).await?;

    Ok(ExactPayload {
        signature: format!("0x{}", hex_encode(&signature)),
        authorization: Eip3009Authorization {
            from: from.to_string(),
            to: pay_to.to_string(),
            value: amount.to_string(),
            valid_after,
            valid_before,
            nonce: format!("0x{}", hex_encode(&nonce_bytes)),
        },
    })
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
