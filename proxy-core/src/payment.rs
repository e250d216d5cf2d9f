//! x402 wire types: payment requirements, signed payloads, and settlement results.
//!
//! Only the `"exact"` scheme (ERC-3009 `transferWithAuthorization`) is modeled;
//! other schemes round-trip as opaque JSON and are rejected by the wallet with
//! [`crate::error::WalletError::UnsupportedScheme`].

use serde::{Deserialize, Serialize};

use crate::timestamp::UnixTimestamp;

/// The only scheme this proxy's wallet knows how to pay.
pub const EXACT_SCHEME: &str = "exact";

/// Terms under which the upstream will accept a payment, as offered in a 402
/// error's `error.data.accepts[]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme, e.g. `"exact"`.
    pub scheme: String,
    /// Network identifier, e.g. `"base-sepolia"`.
    pub network: String,
    /// The token contract address accepting the transfer.
    pub asset: String,
    /// Recipient address.
    pub pay_to: String,
    /// Maximum amount required, atomic units as a decimal string.
    pub max_amount_required: String,
    /// The resource this payment unlocks (tool name, URL, or similar).
    pub resource: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the resource's result.
    pub mime_type: String,
    /// Maximum seconds the signed authorization remains valid for.
    pub max_timeout_seconds: u64,
    /// Scheme-specific extra data (EIP-712 domain name/version, etc.).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl PaymentRequirements {
    /// Parses [`Self::max_amount_required`] as a non-negative integer.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount does not parse as a `u128`.
    pub fn max_amount_required_atomic(&self) -> Result<u128, std::num::ParseIntError> {
        self.max_amount_required.parse()
    }

    /// `true` if this requirement is well-formed enough to attempt payment:
    /// non-empty scheme/network and a parseable amount.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.scheme.is_empty()
            && !self.network.is_empty()
            && self.max_amount_required_atomic().is_ok()
    }
}

/// ERC-3009 `transferWithAuthorization` message fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// Payer address (EOA or smart-account address).
    pub from: String,
    /// Recipient address, copied from [`PaymentRequirements::pay_to`].
    pub to: String,
    /// Transfer amount, atomic units as a decimal string.
    pub value: String,
    /// Earliest moment the authorization may be executed.
    pub valid_after: UnixTimestamp,
    /// Latest moment the authorization remains valid.
    pub valid_before: UnixTimestamp,
    /// 32 random bytes, hex-encoded with a `0x` prefix. Unique per payload.
    pub nonce: String,
}

/// The `"exact"` scheme's scheme-specific payload: a signature plus the
/// authorization it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPayload {
    /// Hex-encoded signature (65-byte EOA signature, or an ERC-1271 envelope
    /// for smart accounts).
    pub signature: String,
    /// The signed authorization message.
    pub authorization: Eip3009Authorization,
}

/// A signed payment, ready to be embedded in a retry request's
/// `params._meta["x402/payment"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version; always `1`.
    pub x402_version: u8,
    /// Always [`EXACT_SCHEME`].
    pub scheme: String,
    /// Network identifier, copied from the chosen requirement.
    pub network: String,
    /// The scheme-specific signed payload.
    pub payload: ExactPayload,
}

impl PaymentPayload {
    /// Builds a V1 `"exact"` payload.
    #[must_use]
    pub fn exact(network: String, payload: ExactPayload) -> Self {
        Self {
            x402_version: 1,
            scheme: EXACT_SCHEME.to_owned(),
            network,
            payload,
        }
    }
}

/// Body of a 402 JSON-RPC error's `data` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version; always `1`.
    pub x402_version: u8,
    /// Acceptable payment methods; possibly empty.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Optional human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present when this 402 itself followed a failed settlement retry.
    #[serde(
        default,
        rename = "x402/payment-response",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_response: Option<SettleResponse>,
}

/// Settlement outcome, reported in a successful response's
/// `result._meta["x402/payment-response"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether the on-chain (or off-chain) settlement succeeded.
    pub success: bool,
    /// Machine-readable failure reason, present only when `success` is `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Transaction hash, present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{Eip3009Authorization, ExactPayload, PaymentPayload, PaymentRequirements};
    use crate::timestamp::UnixTimestamp;

    fn sample_requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_owned(),
            network: "base-sepolia".to_owned(),
            asset: "0xAAA".to_owned(),
            pay_to: "0xBBB".to_owned(),
            max_amount_required: "10000".to_owned(),
            resource: "x".to_owned(),
            description: "d".to_owned(),
            mime_type: "application/json".to_owned(),
            max_timeout_seconds: 300,
            extra: None,
        }
    }

    #[test]
    fn well_formed_requires_parseable_amount() {
        let mut req = sample_requirements();
        assert!(req.is_well_formed());
        req.max_amount_required = "not-a-number".to_owned();
        assert!(!req.is_well_formed());
    }

    #[test]
    fn payment_payload_round_trips_field_for_field() {
        let authorization = Eip3009Authorization {
            from: "0xFROM".to_owned(),
            to: "0xBBB".to_owned(),
            value: "10000".to_owned(),
            valid_after: UnixTimestamp::from_secs(100),
            valid_before: UnixTimestamp::from_secs(700),
            nonce: "0xdeadbeef".to_owned(),
        };
        let payload = PaymentPayload::exact(
            "base-sepolia".to_owned(),
            ExactPayload {
                signature: "0xsig".to_owned(),
                authorization: authorization.clone(),
            },
        );
        let json = serde_json::to_string(&payload).expect("serialize");
        let back: PaymentPayload = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.payload.authorization, authorization);
        assert_eq!(back, payload);
    }
}
