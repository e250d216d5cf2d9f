//! Middleware error taxonomy.

/// Failure modes raised by [`crate::X402Middleware::on_message`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MiddlewareError {
    /// A settle-response arrived whose originating request carried no
    /// `"<proxy>/paymentId"` meta field to correlate it with an
    /// authorization.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] proxy_core::ProtocolViolation),

    /// A settle-response named an authorization id with no matching pending
    /// authorization (already resolved, or never registered).
    #[error("settle-response referenced unknown authorization {0:?}")]
    UnknownAuthorization(String),

    /// The treasurer itself failed while deciding on a payment.
    #[error("treasurer failed: {0}")]
    Treasurer(#[from] proxy_treasurer::TreasurerError),
}
