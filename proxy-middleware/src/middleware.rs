//! The [`X402Middleware`]: classifies responses and drives the treasurer.

use std::collections::HashMap;

use tokio::sync::Mutex;

use proxy_core::jsonrpc::JsonRpcRequest;
use proxy_core::meta::{PAYMENT_META_KEY, payment_id_meta_key, read_meta_key, set_meta_key};
use proxy_core::{ProtocolViolation, jsonrpc::JsonRpcResponse};
use proxy_treasurer::{Authorization, PaymentStatus, RequestContext, Treasurer};

use crate::classify::{Classification, classify};
use crate::error::MiddlewareError;

/// A request the bridge should send upstream in place of forwarding the
/// response it was produced from. The caller (the bridge) is responsible for
/// assigning the retry's JSON-RPC id and preserving the original id for
/// later restoration.
#[derive(Debug, Clone)]
pub struct RetryRequest {
    /// The cloned original request, with the payment meta fields attached.
    pub request: JsonRpcRequest,
}

/// Stateless-per-session message transformer sitting inside a bridge.
///
/// Holds one `pending authorizations` map keyed by authorization id, scoped
/// to this middleware instance (i.e. to a single bridge/session). Purely
/// functional in its request/response arguments: it never sends messages
/// itself, only tells the caller what to send.
pub struct X402Middleware<T: Treasurer> {
    treasurer: T,
    pending_authorizations: Mutex<HashMap<String, Authorization>>,
}

impl<T: Treasurer> std::fmt::Debug for X402Middleware<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Middleware").finish_non_exhaustive()
    }
}

impl<T: Treasurer> X402Middleware<T> {
    /// Builds a middleware instance around `treasurer`, with an empty
    /// pending-authorizations map.
    #[must_use]
    pub fn new(treasurer: T) -> Self {
        Self {
            treasurer,
            pending_authorizations: Mutex::new(HashMap::new()),
        }
    }

    /// Discards every pending authorization without notifying the
    /// treasurer, for use when the owning bridge is closing: in-flight
    /// authorizations are abandoned, not resolved.
    pub async fn clear_pending_authorizations(&self) {
        self.pending_authorizations.lock().await.clear();
    }

    /// Classifies `response` relative to `original_request` and, when it
    /// signals a payment is owed, consults the treasurer and builds a retry.
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareError::ProtocolViolation`] if a settle-response's
    /// originating request carries no payment id, or
    /// [`MiddlewareError::UnknownAuthorization`] if that id names no pending
    /// authorization. Returns [`MiddlewareError::Treasurer`] if the
    /// treasurer itself fails while deciding on a payment.
    pub async fn on_message(
        &self,
        original_request: &JsonRpcRequest,
        response: &JsonRpcResponse,
        context: &RequestContext,
    ) -> Result<Option<RetryRequest>, MiddlewareError> {
        match classify(response) {
            Classification::SettleResponse(settle) => {
                self.handle_settle_response(original_request, &settle, context)
                    .await?;
                Ok(None)
            }
            Classification::PaymentRequired(payment_required) => {
                self.handle_payment_required(original_request, &payment_required, context)
                    .await
            }
            Classification::Ordinary => Ok(None),
        }
    }

    async fn handle_settle_response(
        &self,
        original_request: &JsonRpcRequest,
        settle: &proxy_core::payment::SettleResponse,
        context: &RequestContext,
    ) -> Result<(), MiddlewareError> {
        let params = original_request.params.clone().unwrap_or_default();
        let payment_id_key = payment_id_meta_key();
        let authorization_id = read_meta_key(&params, &payment_id_key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ProtocolViolation::new("settle-response with no paymentId on originating request")
                    .with_correlation_id(original_request.id.as_ref().map_or_else(
                        || "<none>".to_owned(),
                        std::string::ToString::to_string,
                    ))
            })?
            .to_owned();

        let authorization = self
            .pending_authorizations
            .lock()
            .await
            .remove(&authorization_id)
            .ok_or(MiddlewareError::UnknownAuthorization(authorization_id))?;

        let status = if settle.success {
            PaymentStatus::Accepted
        } else {
            PaymentStatus::Rejected
        };
        self.treasurer.on_status(status, &authorization, context).await;
        Ok(())
    }

    async fn handle_payment_required(
        &self,
        original_request: &JsonRpcRequest,
        payment_required: &proxy_core::payment::PaymentRequired,
        context: &RequestContext,
    ) -> Result<Option<RetryRequest>, MiddlewareError> {
        let params = original_request.params.clone().unwrap_or_default();
        if read_meta_key(&params, PAYMENT_META_KEY).is_some() {
            // Already carries a payment: this is a retry that itself 402'd.
            // The double-pay guard forwards the error to the client.
            return Ok(None);
        }

        let Some(authorization) = self
            .treasurer
            .on_payment_required(&payment_required.accepts, context)
            .await?
        else {
            return Ok(None);
        };

        let authorization_id = authorization.authorization_id.clone();
        self.pending_authorizations
            .lock()
            .await
            .insert(authorization_id.clone(), authorization.clone());
        self.treasurer
            .on_status(PaymentStatus::Sending, &authorization, context)
            .await;

        let mut retry = original_request.clone();
        let retry_params = retry.params_mut();
        set_meta_key(
            retry_params,
            PAYMENT_META_KEY,
            serde_json::to_value(&authorization.payment).unwrap_or(serde_json::Value::Null),
        );
        set_meta_key(
            retry_params,
            &payment_id_meta_key(),
            serde_json::Value::String(authorization_id),
        );

        Ok(Some(RetryRequest { request: retry }))
    }
}
