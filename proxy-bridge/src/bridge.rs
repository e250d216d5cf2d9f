//! The [`Bridge`]: joins a server-facing and an upstream-facing transport,
//! routing responses through the x402 middleware and maintaining the
//! request/response correlation map.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, mpsc};

use proxy_core::jsonrpc::{JsonRpcId, JsonRpcRequest, JsonRpcResponse};
use proxy_core::meta::{original_id_meta_key, read_meta_key, set_meta_key};
use proxy_treasurer::{RequestContext, Treasurer};

use crate::error::BridgeError;
use crate::transport::{Transport, TransportEvent};

/// Default ceiling on outstanding upstream requests per bridge.
pub const DEFAULT_MAX_PENDING: usize = 1000;

/// JSON-RPC error code used for the back-pressure rejection sent to the
/// buyer when `pending` is already at capacity. Within the implementation-
/// defined server-error range reserved by the JSON-RPC 2.0 spec.
const BACKPRESSURE_ERROR_CODE: i64 = -32000;

/// Per-session object pairing a buyer-facing transport and an
/// upstream-facing transport, forwarding messages in both directions and
/// routing responses through an [`proxy_middleware::X402Middleware`].
pub struct Bridge<T: Treasurer> {
    session_id: String,
    server_transport: Arc<dyn Transport>,
    upstream_transport: Arc<dyn Transport>,
    middleware: proxy_middleware::X402Middleware<T>,
    pending: Mutex<HashMap<JsonRpcId, JsonRpcRequest>>,
    max_pending: usize,
    started: AtomicBool,
    closing: AtomicBool,
    on_close: Box<dyn Fn() + Send + Sync>,
    on_error: Box<dyn Fn(BridgeError) + Send + Sync>,
}

impl<T: Treasurer> std::fmt::Debug for Bridge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("session_id", &self.session_id)
            .field("max_pending", &self.max_pending)
            .finish_non_exhaustive()
    }
}

impl<T: Treasurer + 'static> Bridge<T> {
    /// Builds a bridge for `session_id`, pairing the two transports over
    /// `middleware`. `on_close` is invoked exactly once, when the bridge
    /// transitions to closed (by either an explicit [`Bridge::close`] or a
    /// transport reporting [`TransportEvent::Closed`]); `on_error` is
    /// invoked for every transport error that does not itself close the
    /// bridge.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        server_transport: Arc<dyn Transport>,
        upstream_transport: Arc<dyn Transport>,
        middleware: proxy_middleware::X402Middleware<T>,
        on_close: impl Fn() + Send + Sync + 'static,
        on_error: impl Fn(BridgeError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            server_transport,
            upstream_transport,
            middleware,
            pending: Mutex::new(HashMap::new()),
            max_pending: DEFAULT_MAX_PENDING,
            started: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            on_close: Box::new(on_close),
            on_error: Box::new(on_error),
        }
    }

    /// Overrides [`DEFAULT_MAX_PENDING`].
    #[must_use]
    pub const fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// The session id this bridge was created for.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Starts both transports and spawns their forwarding loops. Idempotent:
    /// a second call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] if either transport fails to
    /// start.
    pub async fn start(self: &Arc<Self>) -> Result<(), BridgeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (server_tx, mut server_rx) = mpsc::unbounded_channel();
        let (upstream_tx, mut upstream_rx) = mpsc::unbounded_channel();

        self.server_transport.start(server_tx).await?;
        self.upstream_transport.start(upstream_tx).await?;

        let left = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = server_rx.recv().await {
                left.handle_server_event(event).await;
            }
        });

        let right = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = upstream_rx.recv().await {
                right.handle_upstream_event(event).await;
            }
        });

        Ok(())
    }

    async fn handle_server_event(self: &Arc<Self>, event: TransportEvent) {
        match event {
            TransportEvent::Message(message) => self.forward_left_to_right(message).await,
            TransportEvent::Closed => {
                let _ = self.close().await;
            }
            TransportEvent::Error(message) => {
                (self.on_error)(BridgeError::Transport(crate::error::TransportError::SendFailed(
                    message,
                )));
            }
        }
    }

    async fn handle_upstream_event(self: &Arc<Self>, event: TransportEvent) {
        match event {
            TransportEvent::Message(message) => self.forward_right_to_left(message).await,
            TransportEvent::Closed => {
                let _ = self.close().await;
            }
            TransportEvent::Error(message) => {
                (self.on_error)(BridgeError::Transport(crate::error::TransportError::SendFailed(
                    message,
                )));
            }
        }
    }

    /// Buyer → upstream. Requests are tracked in `pending` (subject to
    /// back-pressure); everything else is forwarded unchanged.
    async fn forward_left_to_right(&self, message: Value) {
        let Some(request) = parse_tracked_request(&message) else {
            let _ = self.upstream_transport.send(message).await;
            return;
        };

        let mut pending = self.pending.lock().await;
        if pending.len() >= self.max_pending {
            let pending_len = pending.len();
            drop(pending);
            (self.on_error)(BridgeError::BackpressureExceeded { pending: pending_len });
            let rejection = backpressure_rejection(&request, pending_len);
            let _ = self
                .server_transport
                .send(serde_json::to_value(rejection).unwrap_or(Value::Null))
                .await;
            return;
        }
        // Unwrap-safe: `parse_tracked_request` only returns `Some` when `id` is set.
        if let Some(id) = request.id.clone() {
            pending.insert(id, request.clone());
        }
        drop(pending);

        let _ = self.upstream_transport.send(message).await;
    }

    /// Upstream → buyer. Messages without an id are forwarded verbatim.
    /// Messages with an id are correlated against `pending` and may be
    /// short-circuited into a payment retry by the middleware.
    async fn forward_right_to_left(self: &Arc<Self>, message: Value) {
        let Some(mut response) = parse_response(&message) else {
            let _ = self.server_transport.send(message).await;
            return;
        };

        let original_request = self.pending.lock().await.remove(&response.id);
        let Some(original_request) = original_request else {
            let _ = self.server_transport.send(message).await;
            return;
        };

        let original_id_key = original_id_meta_key();
        let restored_id = original_request
            .params
            .as_ref()
            .and_then(|params| read_meta_key(params, &original_id_key))
            .and_then(|value| serde_json::from_value::<JsonRpcId>(value.clone()).ok());
        if let Some(restored_id) = restored_id {
            response.id = restored_id;
        }

        let context = RequestContext {
            session_id: self.session_id.clone(),
            method: original_request.method.clone(),
        };

        match self
            .middleware
            .on_message(&original_request, &response, &context)
            .await
        {
            Ok(Some(retry)) => {
                self.send_retry(original_request, response.id.clone(), retry).await;
            }
            Ok(None) => {
                let _ = self
                    .server_transport
                    .send(serde_json::to_value(&response).unwrap_or(Value::Null))
                    .await;
            }
            Err(error) => {
                (self.on_error)(BridgeError::Middleware(error));
                let _ = self
                    .server_transport
                    .send(serde_json::to_value(&response).unwrap_or(Value::Null))
                    .await;
            }
        }
    }

    async fn send_retry(
        &self,
        original_request: JsonRpcRequest,
        buyer_visible_id: JsonRpcId,
        retry: proxy_middleware::RetryRequest,
    ) {
        // Falls back to the buyer-visible id if the pending entry somehow
        // lost its own id; `original_request` always had one in practice,
        // since only id-bearing requests are tracked in `pending`.
        let effective_id = original_request.id.clone().unwrap_or_else(|| buyer_visible_id.clone());
        let synthetic_id = effective_id.retry_id_for();

        let mut retry_request = retry.request;
        retry_request.id = Some(synthetic_id.clone());
        let retry_params = retry_request.params_mut();
        set_meta_key(
            retry_params,
            &original_id_meta_key(),
            serde_json::to_value(&buyer_visible_id).unwrap_or(Value::Null),
        );

        self.pending
            .lock()
            .await
            .insert(synthetic_id, retry_request.clone());

        let _ = self
            .upstream_transport
            .send(serde_json::to_value(&retry_request).unwrap_or(Value::Null))
            .await;
    }

    /// Closes both transports exactly once and fires `on_close`. Drops all
    /// pending authorizations without notifying the treasurer — in-flight
    /// retries are abandoned, not resolved.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] if closing a transport fails; the
    /// bridge is still marked closed and `on_close` still fires.
    pub async fn close(&self) -> Result<(), BridgeError> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.middleware.clear_pending_authorizations().await;
        self.pending.lock().await.clear();

        let server_result = self.server_transport.close().await;
        let upstream_result = self.upstream_transport.close().await;
        (self.on_close)();

        server_result?;
        upstream_result?;
        Ok(())
    }
}

/// Parses `message` as a JSON-RPC request, returning `None` for anything
/// that is not a request with an id (notifications and responses forward
/// unchanged, untracked).
fn parse_tracked_request(message: &Value) -> Option<JsonRpcRequest> {
    if message.get("method").is_none() || message.get("id").is_none() {
        return None;
    }
    serde_json::from_value(message.clone()).ok()
}

fn parse_response(message: &Value) -> Option<JsonRpcResponse> {
    if message.get("id").is_none() {
        return None;
    }
    if message.get("result").is_none() && message.get("error").is_none() {
        return None;
    }
    serde_json::from_value(message.clone()).ok()
}

fn backpressure_rejection(request: &JsonRpcRequest, pending: usize) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_owned(),
        id: request.id.clone().unwrap_or(JsonRpcId::Number(0)),
        result: None,
        error: Some(proxy_core::jsonrpc::JsonRpcErrorObject {
            code: BACKPRESSURE_ERROR_CODE,
            message: format!("too many requests in flight ({pending} pending)"),
            data: None,
        }),
    }
}
