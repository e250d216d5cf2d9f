//! Minimal JSON-RPC 2.0 envelope types.
//!
//! The proxy does not reimplement MCP's framing or session semantics; it only
//! needs enough of JSON-RPC 2.0 to correlate requests with responses and to
//! read/write the vendor `_meta` fields documented in [`crate::meta`]. Bodies
//! are otherwise treated as opaque `serde_json::Value`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A JSON-RPC request id: either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    /// Numeric id, as buyer clients typically emit.
    Number(i64),
    /// String id, as synthetic retry ids always are.
    String(String),
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// Prefix applied to every synthetic retry id. Chosen so no well-behaved
/// buyer client would ever emit a colliding id.
pub const RETRY_ID_PREFIX: &str = "retry_with_payment__";

impl JsonRpcId {
    /// Builds the synthetic retry id for an original id.
    #[must_use]
    pub fn retry_id_for(&self) -> Self {
        Self::String(format!("{RETRY_ID_PREFIX}{self}"))
    }

    /// `true` if this id carries [`RETRY_ID_PREFIX`], i.e. it was minted by
    /// the bridge rather than the buyer.
    #[must_use]
    pub fn is_synthetic_retry(&self) -> bool {
        matches!(self, Self::String(s) if s.starts_with(RETRY_ID_PREFIX))
    }
}

/// A JSON-RPC 2.0 request (or notification, when `id` is `None`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Absent for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,
    /// The RPC method name, e.g. `"tools/call"`.
    pub method: String,
    /// Method parameters. MCP always uses an object here when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// `true` if this request expects a response (has an `id`).
    #[must_use]
    pub const fn expects_response(&self) -> bool {
        self.id.is_some()
    }

    /// Mutable access to `params`, creating an empty object if absent.
    pub fn params_mut(&mut self) -> &mut Value {
        self.params.get_or_insert_with(|| Value::Object(serde_json::Map::new()))
    }
}

/// The structured `error` field of a JSON-RPC error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Error code. `402` signals payment-required in this proxy's domain.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Structured error payload; shape is code-dependent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC code used for the x402 "payment required" signal.
pub const PAYMENT_REQUIRED_CODE: i64 = 402;

/// A JSON-RPC 2.0 response: either a success or an error, always carrying
/// the id of the request it answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Echoes the request id this answers.
    pub id: JsonRpcId,
    /// Present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    /// `true` if this is a JSON-RPC error with [`PAYMENT_REQUIRED_CODE`].
    #[must_use]
    pub fn is_payment_required(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.code == PAYMENT_REQUIRED_CODE)
    }

    /// Builds a success response with the given result, reusing the request id.
    #[must_use]
    pub fn success(id: JsonRpcId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }
}
