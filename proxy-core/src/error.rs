//! Shared error taxonomy for the proxy's payment flow.
//!
//! Mirrors the teacher's rich-struct-error idiom: variants that carry
//! multiple optional context fields get their own struct with a manual
//! [`std::fmt::Display`] impl rather than a bare `#[error("...")]` string.

use std::fmt;

/// A JSON-RPC message did not conform to the shape the x402 middleware
/// expects at a given point in the retry flow.
#[derive(Debug, Clone)]
pub struct ProtocolViolation {
    /// What was expected but missing or malformed.
    pub reason: String,
    /// The request or response id involved, if any, for log correlation.
    pub correlation_id: Option<String>,
}

impl ProtocolViolation {
    /// Builds a violation with no correlation id.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            correlation_id: None,
        }
    }

    /// Attaches a correlation id (request/response id) for logging.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.correlation_id {
            Some(id) => write!(f, "protocol violation ({id}): {}", self.reason),
            None => write!(f, "protocol violation: {}", self.reason),
        }
    }
}

impl std::error::Error for ProtocolViolation {}
