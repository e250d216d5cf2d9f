//! Classifies a JSON-RPC response relative to the request that produced it.

use proxy_core::jsonrpc::{JsonRpcResponse, PAYMENT_REQUIRED_CODE};
use proxy_core::meta::{PAYMENT_RESPONSE_META_KEY, read_meta_key};
use proxy_core::payment::{PaymentRequired, SettleResponse};

/// The three ways a response can relate to the x402 payment flow.
#[derive(Debug)]
pub enum Classification {
    /// A JSON-RPC error with code 402 carrying a parseable
    /// [`PaymentRequired`] body in `error.data`.
    PaymentRequired(PaymentRequired),
    /// A JSON-RPC success whose `result._meta` carries a settle result.
    SettleResponse(SettleResponse),
    /// Neither of the above; forwarded unchanged.
    Ordinary,
}

/// Classifies `response` per the rules in the wire protocol: a 402 error
/// whose `data` parses as [`PaymentRequired`] is payment-required; a success
/// whose `result._meta["x402/payment-response"]` is present is a
/// settle-response; everything else is ordinary.
#[must_use]
pub fn classify(response: &JsonRpcResponse) -> Classification {
    if let Some(error) = &response.error
        && error.code == PAYMENT_REQUIRED_CODE
        && let Some(data) = &error.data
        && let Ok(payment_required) = serde_json::from_value::<PaymentRequired>(data.clone())
    {
        return Classification::PaymentRequired(payment_required);
    }

    if let Some(result) = &response.result
        && let Some(meta_value) = read_meta_key(result, PAYMENT_RESPONSE_META_KEY)
        && let Ok(settle_response) = serde_json::from_value::<SettleResponse>(meta_value.clone())
    {
        return Classification::SettleResponse(settle_response);
    }

    Classification::Ordinary
}

#[cfg(test)]
mod tests {
    use super::{Classification, classify};
    use proxy_core::jsonrpc::{JsonRpcErrorObject, JsonRpcId, JsonRpcResponse};
    use serde_json::json;

    #[test]
    fn classifies_402_error_as_payment_required() {
        let response = JsonRpcResponse {
            jsonrpc: "2.0".to_owned(),
            id: JsonRpcId::Number(1),
            result: None,
            error: Some(JsonRpcErrorObject {
                code: 402,
                message: "payment required".to_owned(),
                data: Some(json!({
                    "x402Version": 1,
                    "accepts": [{
                        "scheme": "exact",
                        "network": "base-sepolia",
                        "asset": "0xabc",
                        "payTo": "0xdef",
                        "maxAmountRequired": "1000",
                        "resource": "r",
                        "description": "d",
                        "mimeType": "application/json",
                        "maxTimeoutSeconds": 60,
                        "extra": null,
                    }],
                    "error": null,
                    "x402/payment-response": null,
                })),
            }),
        };

        assert!(matches!(classify(&response), Classification::PaymentRequired(_)));
    }

    #[test]
    fn classifies_settle_result_meta_as_settle_response() {
        let response = JsonRpcResponse {
            jsonrpc: "2.0".to_owned(),
            id: JsonRpcId::Number(1),
            result: Some(json!({
                "content": [],
                "_meta": {
                    "x402/payment-response": { "success": true, "errorReason": null, "transaction": "0x1" }
                }
            })),
            error: None,
        };

        assert!(matches!(classify(&response), Classification::SettleResponse(_)));
    }

    #[test]
    fn ordinary_response_has_no_special_classification() {
        let response = JsonRpcResponse {
            jsonrpc: "2.0".to_owned(),
            id: JsonRpcId::Number(1),
            result: Some(json!({ "content": [] })),
            error: None,
        };

        assert!(matches!(classify(&response), Classification::Ordinary));
    }
}
