#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the x402 MCP payment proxy.
//!
//! This crate is blockchain- and transport-agnostic: it defines the x402 wire
//! types (payment requirements, signed payloads, settlement results), the
//! vendor `_meta` keys the proxy reads and writes, and a minimal JSON-RPC 2.0
//! envelope used to correlate requests and responses. Signing lives in
//! `proxy-wallet`; payment policy in `proxy-treasurer`; the retry state
//! machine in `proxy-middleware` and `proxy-bridge`.
//!
//! # Modules
//!
//! - [`payment`] - x402 wire types (`PaymentRequirements`, `PaymentPayload`, `SettleResponse`)
//! - [`jsonrpc`] - minimal JSON-RPC 2.0 request/response envelope
//! - [`meta`] - vendor-namespaced `_meta` key names and accessors
//! - [`timestamp`] - Unix timestamp type used in ERC-3009 authorization windows
//! - [`error`] - shared protocol-violation error type

pub mod error;
pub mod jsonrpc;
pub mod meta;
pub mod payment;
pub mod timestamp;

pub use error::ProtocolViolation;
pub use jsonrpc::{JsonRpcErrorObject, JsonRpcId, JsonRpcRequest, JsonRpcResponse};
pub use payment::{Eip3009Authorization, ExactPayload, PaymentPayload, PaymentRequired, PaymentRequirements, SettleResponse};
pub use timestamp::UnixTimestamp;
