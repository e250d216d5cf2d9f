//! Vendor-namespaced `_meta` keys and helpers for reading/writing them on raw
//! JSON-RPC `params`/`result` objects.
//!
//! These names must be preserved bit-exactly: both the upstream MCP server
//! and the buyer client observe them directly.

use serde_json::{Map, Value};

/// Vendor prefix used for proxy-internal meta keys (as opposed to the
/// protocol-level `"x402/..."` keys, which are shared with any x402-aware
/// MCP server).
pub const VENDOR_PREFIX: &str = "x402-mcp-proxy";

/// Key under `params._meta` carrying the signed [`crate::PaymentPayload`].
pub const PAYMENT_META_KEY: &str = "x402/payment";

/// Key under `result._meta` carrying the [`crate::SettleResponse`].
pub const PAYMENT_RESPONSE_META_KEY: &str = "x402/payment-response";

/// Key under `params._meta` binding a retry request to its
/// [`crate::Authorization`] id.
pub fn payment_id_meta_key() -> String {
    format!("{VENDOR_PREFIX}/paymentId")
}

/// Key under a retry request's `params._meta` holding the buyer-visible id
/// that must be restored before the response reaches the buyer.
pub fn original_id_meta_key() -> String {
    format!("{VENDOR_PREFIX}/original-id")
}

/// Reads `obj._meta` as a JSON object, if present.
#[must_use]
pub fn read_meta(obj: &Value) -> Option<&Map<String, Value>> {
    obj.get("_meta")?.as_object()
}

/// Reads a single key out of `obj._meta`.
#[must_use]
pub fn read_meta_key<'a>(obj: &'a Value, key: &str) -> Option<&'a Value> {
    read_meta(obj)?.get(key)
}

/// Inserts `key: value` into `obj._meta`, creating the `_meta` object if
/// absent. `obj` must already be a JSON object.
pub fn set_meta_key(obj: &mut Value, key: &str, value: Value) {
    let Some(map) = obj.as_object_mut() else {
        return;
    };
    let meta = map
        .entry("_meta")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(meta_map) = meta.as_object_mut() {
        meta_map.insert(key.to_owned(), value);
    }
}
