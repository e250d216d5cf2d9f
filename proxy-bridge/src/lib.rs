//! Per-session bridge joining a buyer-facing transport and an
//! upstream-facing transport, forwarding JSON-RPC traffic in both
//! directions and routing responses through the x402 middleware.
//!
//! The [`Transport`] trait stands in for the coroutine-based transports a
//! non-Rust implementation would write directly: `start`/`send`/`close`
//! plus an event channel carrying inbound messages, closes, and errors.

mod bridge;
mod error;
mod transport;

pub use bridge::{Bridge, DEFAULT_MAX_PENDING};
pub use error::{BridgeError, TransportError};
pub use transport::{BoxFuture, Transport, TransportEvent};
