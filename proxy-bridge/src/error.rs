//! Bridge and transport error taxonomy.

/// Failures a [`crate::Transport`] implementation may report.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The transport could not be started (connection refused, handshake
    /// failure, etc.).
    #[error("transport failed to start: {0}")]
    StartFailed(String),
    /// Sending a message failed.
    #[error("transport send failed: {0}")]
    SendFailed(String),
    /// The transport was already closed.
    #[error("transport already closed")]
    Closed,
}

/// Failures raised by [`crate::Bridge`] itself, as distinct from its
/// transports or middleware.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BridgeError {
    /// The bridge's `pending` map was at capacity when a new outbound
    /// request arrived from the server-facing transport.
    #[error("back-pressure exceeded: {pending} requests already in flight")]
    BackpressureExceeded {
        /// The `MAX_PENDING` ceiling that was hit.
        pending: usize,
    },

    /// A transport reported a failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The x402 middleware could not process a response.
    #[error(transparent)]
    Middleware(#[from] proxy_middleware::MiddlewareError),
}
