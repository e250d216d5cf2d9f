//! The [`Wallet`] trait and its two variants: plain EOA and ERC-4337 smart
//! account (session key + ownable-validator + ERC-1271).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;

use proxy_core::{PaymentPayload, PaymentRequirements, payment::EXACT_SCHEME};

use crate::error::WalletError;
use crate::signing::sign_erc3009_authorization;

/// Boxed future used for the dyn-compatible [`Wallet`] trait, matching the
/// rest of the proxy's async-trait-free style.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Produces signed payment payloads from payment requirements.
///
/// Implementations must reject anything but the `"exact"` scheme with
/// [`WalletError::UnsupportedScheme`] rather than attempting a best effort.
pub trait Wallet: Send + Sync {
    /// Signs `requirements`, returning a payload ready for
    /// `params._meta["x402/payment"]`.
    fn create_payment(
        &self,
        requirements: &PaymentRequirements,
    ) -> BoxFuture<'_, Result<PaymentPayload, WalletError>>;

    /// The address this wallet pays from (EOA address, or smart-account
    /// address for the smart-account variant).
    fn address(&self) -> Address;

    /// Signs an arbitrary UTF-8 message (EIP-191 `personal_sign`), used for
    /// the Sign-In-With-Ethereum-style login handshake a remote-policy
    /// treasurer performs once per process.
    fn sign_message(&self, message: &str) -> BoxFuture<'_, Result<String, WalletError>>;
}

impl<T: Wallet + ?Sized> Wallet for Arc<T> {
    fn create_payment(
        &self,
        requirements: &PaymentRequirements,
    ) -> BoxFuture<'_, Result<PaymentPayload, WalletError>> {
        self.as_ref().create_payment(requirements)
    }

    fn address(&self) -> Address {
        self.as_ref().address()
    }

    fn sign_message(&self, message: &str) -> BoxFuture<'_, Result<String, WalletError>> {
        self.as_ref().sign_message(message)
    }
}

fn reject_non_exact(requirements: &PaymentRequirements) -> Result<(), WalletError> {
    if requirements.scheme != EXACT_SCHEME {
        return Err(WalletError::UnsupportedScheme(requirements.scheme.clone()));
    }
    Ok(())
}

/// An externally-owned account wallet: signs the EIP-712 digest directly
/// with its private key.
#[derive(Debug, Clone)]
pub struct EoaWallet {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl EoaWallet {
    /// Builds an EOA wallet from a raw private key signer.
    #[must_use]
    pub const fn new(signer: PrivateKeySigner, chain_id: u64) -> Self {
        Self { signer, chain_id }
    }
}

impl Wallet for EoaWallet {
    fn create_payment(
        &self,
        requirements: &PaymentRequirements,
    ) -> BoxFuture<'_, Result<PaymentPayload, WalletError>> {
        let requirements = requirements.clone();
        let chain_id = self.chain_id;
        let from = alloy_signer::Signer::address(&self.signer);
        Box::pin(async move {
            reject_non_exact(&requirements)?;
            let payload = sign_erc3009_authorization(&self.signer, from, chain_id, &requirements).await?;
            Ok(PaymentPayload::exact(requirements.network, payload))
        })
    }

    fn address(&self) -> Address {
        alloy_signer::Signer::address(&self.signer)
    }

    fn sign_message(&self, message: &str) -> BoxFuture<'_, Result<String, WalletError>> {
        let message = message.to_owned();
        Box::pin(async move {
            let signature = alloy_signer::Signer::sign_message(&self.signer, message.as_bytes())
                .await
                .map_err(|e| WalletError::SigningFailed(e.to_string()))?;
            Ok(format!("0x{}", hex_encode(&signature.as_bytes())))
        })
    }
}

/// The fixed byte length of an address, used when splicing the ownable
/// validator address into the ERC-1271 signature envelope.
const ADDRESS_LEN: usize = 20;

/// An ERC-4337 smart-account wallet. The EIP-712 digest is signed with a
/// session key, wrapped in the ownable-validator's single-signature
/// (threshold = 1) envelope, and ERC-1271-encoded against the smart account.
///
/// Wire format: `signature = validator_address ++ session_signature`. The
/// smart account's `isValidSignature` dispatches on the leading 20 bytes to
/// select the ownable-validator module, which then recovers the session
/// key's signer from the trailing 65 bytes — the convention used by
/// ERC-7579-style modular accounts (Safe7579 and similar).
#[derive(Debug, Clone)]
pub struct SmartAccountWallet {
    session_signer: PrivateKeySigner,
    smart_account_address: Address,
    validator_address: Address,
    chain_id: u64,
}

impl SmartAccountWallet {
    /// Builds a smart-account wallet.
    #[must_use]
    pub const fn new(
        session_signer: PrivateKeySigner,
        smart_account_address: Address,
        validator_address: Address,
        chain_id: u64,
    ) -> Self {
        Self {
            session_signer,
            smart_account_address,
            validator_address,
            chain_id,
        }
    }

    /// The ownable-validator module address this wallet signs through.
    #[must_use]
    pub const fn validator_address(&self) -> Address {
        self.validator_address
    }
}

impl Wallet for SmartAccountWallet {
    fn create_payment(
        &self,
        requirements: &PaymentRequirements,
    ) -> BoxFuture<'_, Result<PaymentPayload, WalletError>> {
        let requirements = requirements.clone();
        let chain_id = self.chain_id;
        let smart_account_address = self.smart_account_address;
        Box::pin(async move {
            reject_non_exact(&requirements)?;

            // The authorization's `from` is the smart account, not the
            // session key — it's what moves funds on-chain. Passing it as
            // `from` makes the session key sign the same digest a verifier
            // reconstructs from the wire payload, rather than a digest built
            // around the session key's own address.
            let mut payload = sign_erc3009_authorization(
                &self.session_signer,
                smart_account_address,
                chain_id,
                &requirements,
            )
            .await?;

            let raw_signature = hex_decode(&payload.signature)?;
            let mut wrapped = Vec::with_capacity(ADDRESS_LEN + raw_signature.len());
            wrapped.extend_from_slice(self.validator_address.as_slice());
            wrapped.extend_from_slice(&raw_signature);
            payload.signature = format!("0x{}", hex_encode(&wrapped));

            Ok(PaymentPayload::exact(requirements.network, payload))
        })
    }

    fn address(&self) -> Address {
        self.smart_account_address
    }

    fn sign_message(&self, message: &str) -> BoxFuture<'_, Result<String, WalletError>> {
        let message = message.to_owned();
        Box::pin(async move {
            let signature =
                alloy_signer::Signer::sign_message(&self.session_signer, message.as_bytes())
                    .await
                    .map_err(|e| WalletError::SigningFailed(e.to_string()))?;
            let mut wrapped = Vec::with_capacity(ADDRESS_LEN + 65);
            wrapped.extend_from_slice(self.validator_address.as_slice());
            wrapped.extend_from_slice(&signature.as_bytes());
            Ok(format!("0x{}", hex_encode(&wrapped)))
        })
    }
}

fn hex_decode(s: &str) -> Result<Vec<u8>, WalletError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(s.get(i..i + 2).unwrap_or_default(), 16)
                .map_err(|e| WalletError::SigningFailed(format!("bad hex signature: {e}")))
        })
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::{EoaWallet, SmartAccountWallet, Wallet};
    use alloy_signer_local::PrivateKeySigner;
    use proxy_core::PaymentRequirements;

    fn sample_requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_owned(),
            network: "base-sepolia".to_owned(),
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_owned(),
            pay_to: PrivateKeySigner::random().address().to_string(),
            max_amount_required: "10000".to_owned(),
            resource: "x".to_owned(),
            description: "d".to_owned(),
            mime_type: "application/json".to_owned(),
            max_timeout_seconds: 300,
            extra: Some(serde_json::json!({ "name": "USDC", "version": "2" })),
        }
    }

    #[tokio::test]
    async fn eoa_wallet_signs_from_its_own_address() {
        let signer = PrivateKeySigner::random();
        let address = alloy_signer::Signer::address(&signer);
        let wallet = EoaWallet::new(signer, 84532);

        let payload = wallet
            .create_payment(&sample_requirements())
            .await
            .expect("signs");
        assert_eq!(payload.payload.authorization.from, address.to_string());
    }

    #[tokio::test]
    async fn smart_account_wallet_authorizes_from_smart_account_address() {
        let session_signer = PrivateKeySigner::random();
        let smart_account_address = PrivateKeySigner::random().address();
        let validator_address = PrivateKeySigner::random().address();
        let wallet = SmartAccountWallet::new(
            session_signer,
            smart_account_address,
            validator_address,
            84532,
        );

        let payload = wallet
            .create_payment(&sample_requirements())
            .await
            .expect("signs");
        assert_eq!(
            payload.payload.authorization.from,
            smart_account_address.to_string()
        );

        let signature = payload.payload.signature.trim_start_matches("0x");
        let validator_hex: String = validator_address
            .as_slice()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        assert!(signature.starts_with(&validator_hex));
        assert_eq!(wallet.address(), smart_account_address);
    }

    /// The wire `authorization.from` is the smart account, but the digest
    /// that was actually signed must be built around that same `from` — not
    /// the session key's own address — or a verifier reconstructing the
    /// digest from the wire payload will recover the wrong signer.
    #[tokio::test]
    async fn smart_account_signature_recovers_against_digest_built_from_wire_from() {
        use alloy_primitives::{Address, FixedBytes, Signature, U256, eip712_domain};
        use alloy_sol_types::SolStruct;

        let session_signer = PrivateKeySigner::random();
        let smart_account_address = PrivateKeySigner::random().address();
        let validator_address = PrivateKeySigner::random().address();
        let wallet = SmartAccountWallet::new(
            session_signer.clone(),
            smart_account_address,
            validator_address,
            84532,
        );

        let requirements = sample_requirements();
        let payload = wallet
            .create_payment(&requirements)
            .await
            .expect("signs")
            .payload;

        assert_eq!(payload.authorization.from, smart_account_address.to_string());

        // Strip the validator-address prefix to recover the raw 65-byte
        // session-key signature.
        let wrapped = super::hex_decode(&payload.signature).expect("valid hex");
        let raw_signature = &wrapped[super::ADDRESS_LEN..];

        let domain_extra: crate::signing::DomainExtra =
            serde_json::from_value(requirements.extra.clone().unwrap()).unwrap();
        let domain = eip712_domain! {
            name: domain_extra.name,
            version: domain_extra.version,
            chain_id: 84532u64,
            verifying_contract: requirements.asset.parse::<Address>().unwrap(),
        };

        let nonce_bytes = super::hex_decode(&payload.authorization.nonce).expect("valid hex");
        let reconstructed = crate::signing::TransferWithAuthorization {
            from: smart_account_address,
            to: payload.authorization.to.parse().unwrap(),
            value: U256::from(payload.authorization.value.parse::<u128>().unwrap()),
            validAfter: U256::from(payload.authorization.valid_after.as_secs()),
            validBefore: U256::from(payload.authorization.valid_before.as_secs()),
            nonce: FixedBytes::<32>::from_slice(&nonce_bytes),
        };
        let digest = reconstructed.eip712_signing_hash(&domain);

        let signature = Signature::from_raw(raw_signature).expect("valid signature bytes");
        let recovered = signature.recover_address_from_prehash(&digest).expect("recovers");

        assert_eq!(recovered, session_signer.address());
    }

    #[tokio::test]
    async fn eoa_wallet_signs_login_messages() {
        let signer = PrivateKeySigner::random();
        let wallet = EoaWallet::new(signer, 84532);
        let signature = wallet.sign_message("sign in please").await.expect("signs");
        assert!(signature.starts_with("0x"));
    }

    #[tokio::test]
    async fn rejects_unsupported_scheme() {
        let signer = PrivateKeySigner::random();
        let wallet = EoaWallet::new(signer, 84532);
        let mut requirements = sample_requirements();
        requirements.scheme = "upto".to_owned();

        let result = wallet.create_payment(&requirements).await;
        assert!(matches!(
            result,
            Err(super::WalletError::UnsupportedScheme(_))
        ));
    }
}
