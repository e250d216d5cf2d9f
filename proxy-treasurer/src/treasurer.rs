//! The [`Treasurer`] trait: policy layer over a [`proxy_wallet::Wallet`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use proxy_core::PaymentRequirements;

use crate::error::TreasurerError;

/// Boxed future used throughout this crate's dyn-compatible traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A payment created on the buyer's behalf, pending a settle-response.
#[derive(Debug, Clone)]
pub struct Authorization {
    /// The signed payment that was sent to the upstream.
    pub payment: proxy_core::PaymentPayload,
    /// Opaque id binding this authorization to its retry request, unique
    /// within the proxy process's lifetime.
    pub authorization_id: String,
}

impl Authorization {
    /// Creates a new authorization with a fresh random id.
    #[must_use]
    pub fn new(payment: proxy_core::PaymentPayload) -> Self {
        Self {
            payment,
            authorization_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Lifecycle status reported via [`Treasurer::on_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// The retry carrying this payment is about to be sent upstream.
    Sending,
    /// The upstream settled the payment successfully.
    Accepted,
    /// The upstream reported settlement failure.
    Rejected,
    /// The treasurer declined to authorize a payment (no requirement chosen).
    Declined,
    /// An error occurred while processing this payment outside of an
    /// explicit accept/reject (e.g. a protocol violation).
    Error,
}

/// Ambient information about the request a payment decision is being made
/// for, passed through to remote-policy treasurers as authorization context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The session id the request belongs to.
    pub session_id: String,
    /// The JSON-RPC method being retried, e.g. `"tools/call"`.
    pub method: String,
}

/// Policy layer deciding *whether* to pay and *which* offered requirement to
/// satisfy, delegating payload construction to a [`proxy_wallet::Wallet`].
///
/// `on_status` must be idempotent and tolerate out-of-order or repeated
/// calls: it is a best-effort notification, never a transactional commit
/// point, and its failures must never propagate back into the payment flow.
pub trait Treasurer: Send + Sync {
    /// Decides whether to pay for one of `requirements`, returning the
    /// chosen authorization or `None` to decline.
    fn on_payment_required<'a>(
        &'a self,
        requirements: &'a [PaymentRequirements],
        context: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Option<Authorization>, TreasurerError>>;

    /// Reports a lifecycle status for a previously created authorization.
    fn on_status<'a>(
        &'a self,
        status: PaymentStatus,
        authorization: &'a Authorization,
        context: &'a RequestContext,
    ) -> BoxFuture<'a, ()>;
}

impl<T: Treasurer + ?Sized> Treasurer for Arc<T> {
    fn on_payment_required<'a>(
        &'a self,
        requirements: &'a [PaymentRequirements],
        context: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Option<Authorization>, TreasurerError>> {
        self.as_ref().on_payment_required(requirements, context)
    }

    fn on_status<'a>(
        &'a self,
        status: PaymentStatus,
        authorization: &'a Authorization,
        context: &'a RequestContext,
    ) -> BoxFuture<'a, ()> {
        self.as_ref().on_status(status, authorization, context)
    }
}
