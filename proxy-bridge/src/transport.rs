//! The [`Transport`] abstraction: an explicit start/send/close interface
//! plus an event channel, standing in for the coroutine-based transports a
//! non-Rust implementation would write as a `for await` loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Boxed future used for the dyn-compatible [`Transport`] trait.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something a transport reports about its own lifecycle or inbound
/// traffic, pushed onto the channel handed to [`Transport::start`].
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A JSON-RPC message (request, response, or notification) arrived.
    Message(Value),
    /// The transport closed, whether by peer action or local request.
    Closed,
    /// The transport hit an error that does not by itself close it.
    Error(String),
}

/// One side of a bridge: either the server-facing transport (facing the
/// buyer client) or the upstream-facing transport (facing the MCP server).
///
/// `start` takes ownership of an event sender rather than registering
/// callbacks directly — the Rust equivalent of the weak callback
/// back-references the source uses, since dropping the sender (when the
/// bridge itself drops) is how the reference is cleared.
pub trait Transport: Send + Sync {
    /// Begins reading from the underlying connection, pushing every
    /// inbound message, close, or error onto `events`. Must be idempotent:
    /// a transport that is already started returns `Ok(())` without
    /// starting twice.
    fn start(&self, events: mpsc::UnboundedSender<TransportEvent>) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Sends `message` on this transport.
    fn send(&self, message: Value) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Closes the transport. Must be idempotent.
    fn close(&self) -> BoxFuture<'_, Result<(), TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn start(&self, events: mpsc::UnboundedSender<TransportEvent>) -> BoxFuture<'_, Result<(), TransportError>> {
        self.as_ref().start(events)
    }

    fn send(&self, message: Value) -> BoxFuture<'_, Result<(), TransportError>> {
        self.as_ref().send(message)
    }

    fn close(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        self.as_ref().close()
    }
}
