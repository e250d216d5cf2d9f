#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP front door for the x402 MCP payment proxy.
//!
//! Parses and validates the upstream `target` URL from a query parameter,
//! creates or looks up a session's [`proxy_bridge::Bridge`] by
//! `mcp-session-id`, hands HTTP bodies to the bridge, and manages session
//! lifecycle: creation on the first message, teardown on explicit `DELETE`
//! or a bridge reporting its own close.
//!
//! # Modules
//!
//! - [`config`] — process configuration and wallet/treasurer construction
//! - [`error`] — HTTP-facing error taxonomy
//! - [`handlers`] — the `/mcp` and `/healthz` Axum handlers
//! - [`session`] — the process-wide session registry
//! - [`transport`] — HTTP-backed [`proxy_bridge::Transport`] implementations
//! - [`run`] — server initialization and runtime

pub mod config;
pub mod error;
pub mod handlers;
pub mod run;
pub mod session;
pub mod transport;

pub use run::run;
