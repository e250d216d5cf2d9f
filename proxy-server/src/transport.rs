//! Concrete [`Transport`] implementations bridging the bridge's persistent
//! bidirectional abstraction onto an HTTP POST-per-message wire reality.
//!
//! [`HttpServerTransport`] is buyer-facing: one [`HttpServerTransport::dispatch`]
//! call per incoming HTTP POST, correlated against the bridge's eventual
//! [`Transport::send`] by JSON-RPC id. [`HttpUpstreamTransport`] is
//! upstream-facing: every [`Transport::send`] is one POST to the configured
//! target URL, whose response is pushed back as an inbound event.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};
use url::Url;

use proxy_bridge::{BoxFuture, Transport, TransportError, TransportEvent};
use proxy_core::jsonrpc::JsonRpcId;

/// Buyer-facing transport: one HTTP POST body in, one HTTP response body out,
/// correlated through the bridge via `_meta`-free JSON-RPC ids.
#[derive(Debug, Default)]
pub struct HttpServerTransport {
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    pending: Mutex<HashMap<JsonRpcId, oneshot::Sender<Value>>>,
}

impl HttpServerTransport {
    /// Builds an unstarted transport.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Feeds one buyer HTTP request into the bridge and waits for the
    /// matching response. Notifications (no `id`) return `Value::Null`
    /// immediately without waiting, since no response is expected.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the transport was never started
    /// or has since been closed.
    pub async fn dispatch(&self, message: Value) -> Result<Value, TransportError> {
        let events = self
            .events
            .lock()
            .await
            .clone()
            .ok_or(TransportError::Closed)?;

        let id: Option<JsonRpcId> = message
            .get("id")
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        let Some(id) = id else {
            events
                .send(TransportEvent::Message(message))
                .map_err(|_| TransportError::Closed)?;
            return Ok(Value::Null);
        };

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        events
            .send(TransportEvent::Message(message))
            .map_err(|_| TransportError::Closed)?;

        rx.await.map_err(|_| TransportError::Closed)
    }
}

impl Transport for HttpServerTransport {
    fn start(&self, events: mpsc::UnboundedSender<TransportEvent>) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            *self.events.lock().await = Some(events);
            Ok(())
        })
    }

    fn send(&self, message: Value) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            let id: Option<JsonRpcId> = message
                .get("id")
                .and_then(|v| serde_json::from_value(v.clone()).ok());
            if let Some(id) = id
                && let Some(tx) = self.pending.lock().await.remove(&id)
            {
                let _ = tx.send(message);
            }
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            *self.events.lock().await = None;
            self.pending.lock().await.clear();
            Ok(())
        })
    }
}

/// Upstream-facing transport: every outbound message is one POST to `target`;
/// its HTTP response (when non-empty) is pushed back as an inbound event.
#[derive(Debug)]
pub struct HttpUpstreamTransport {
    client: reqwest::Client,
    target: Url,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
}

impl HttpUpstreamTransport {
    /// Builds an unstarted transport pointing at `target`.
    #[must_use]
    pub fn new(client: reqwest::Client, target: Url) -> Arc<Self> {
        Arc::new(Self { client, target, events: Mutex::new(None) })
    }
}

impl Transport for HttpUpstreamTransport {
    fn start(&self, events: mpsc::UnboundedSender<TransportEvent>) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            *self.events.lock().await = Some(events);
            Ok(())
        })
    }

    fn send(&self, message: Value) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            let events = self.events.lock().await.clone().ok_or(TransportError::Closed)?;

            let response = self
                .client
                .post(self.target.clone())
                .json(&message)
                .send()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;

            // Notifications are answered with an empty 202; nothing to push.
            if response.status() == StatusCode::ACCEPTED {
                return Ok(());
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            events
                .send(TransportEvent::Message(body))
                .map_err(|_| TransportError::Closed)?;
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            *self.events.lock().await = None;
            Ok(())
        })
    }
}
