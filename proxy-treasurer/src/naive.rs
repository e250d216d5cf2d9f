//! The naive treasurer: always pays the first offered requirement.

use std::sync::Arc;

use proxy_core::PaymentRequirements;
use proxy_wallet::Wallet;

use crate::error::TreasurerError;
use crate::treasurer::{Authorization, BoxFuture, PaymentStatus, RequestContext, Treasurer};

/// Auto-approves the first requirement in `accepts`, or declines if the list
/// is empty. `on_status` only logs — there is no remote party to notify.
#[derive(Clone)]
pub struct NaiveTreasurer {
    wallet: Arc<dyn Wallet>,
}

impl std::fmt::Debug for NaiveTreasurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NaiveTreasurer").finish_non_exhaustive()
    }
}

impl NaiveTreasurer {
    /// Builds a naive treasurer around `wallet`.
    #[must_use]
    pub const fn new(wallet: Arc<dyn Wallet>) -> Self {
        Self { wallet }
    }
}

impl Treasurer for NaiveTreasurer {
    fn on_payment_required<'a>(
        &'a self,
        requirements: &'a [PaymentRequirements],
        _context: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Option<Authorization>, TreasurerError>> {
        Box::pin(async move {
            let Some(chosen) = requirements.first() else {
                return Ok(None);
            };
            let payment = self.wallet.create_payment(chosen).await?;
            Ok(Some(Authorization::new(payment)))
        })
    }

    fn on_status<'a>(
        &'a self,
        status: PaymentStatus,
        authorization: &'a Authorization,
        context: &'a RequestContext,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            tracing_log(status, authorization, context);
        })
    }
}

fn tracing_log(status: PaymentStatus, authorization: &Authorization, context: &RequestContext) {
    #[cfg(feature = "telemetry")]
    tracing::info!(
        authorization_id = %authorization.authorization_id,
        session_id = %context.session_id,
        status = ?status,
        "payment status"
    );
    #[cfg(not(feature = "telemetry"))]
    let _ = (status, authorization, context);
}

#[cfg(test)]
mod tests {
    use super::NaiveTreasurer;
    use crate::treasurer::{PaymentStatus, RequestContext, Treasurer};
    use alloy_signer_local::PrivateKeySigner;
    use proxy_core::PaymentRequirements;
    use proxy_wallet::EoaWallet;
    use std::sync::Arc;

    fn context() -> RequestContext {
        RequestContext {
            session_id: "s1".to_owned(),
            method: "tools/call".to_owned(),
        }
    }

    fn requirement() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_owned(),
            network: "base-sepolia".to_owned(),
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_owned(),
            pay_to: PrivateKeySigner::random().address().to_string(),
            max_amount_required: "10000".to_owned(),
            resource: "x".to_owned(),
            description: "d".to_owned(),
            mime_type: "application/json".to_owned(),
            max_timeout_seconds: 300,
            extra: Some(serde_json::json!({ "name": "USDC", "version": "2" })),
        }
    }

    #[tokio::test]
    async fn declines_when_no_requirements_offered() {
        let wallet = Arc::new(EoaWallet::new(PrivateKeySigner::random(), 84532));
        let treasurer = NaiveTreasurer::new(wallet);
        let result = treasurer.on_payment_required(&[], &context()).await.expect("ok");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn pays_first_requirement_when_offered() {
        let wallet = Arc::new(EoaWallet::new(PrivateKeySigner::random(), 84532));
        let treasurer = NaiveTreasurer::new(wallet);
        let reqs = vec![requirement()];
        let result = treasurer
            .on_payment_required(&reqs, &context())
            .await
            .expect("ok")
            .expect("some authorization");
        assert_eq!(result.payment.network, "base-sepolia");

        // on_status never panics or propagates, even called out of order.
        treasurer
            .on_status(PaymentStatus::Accepted, &result, &context())
            .await;
        treasurer
            .on_status(PaymentStatus::Accepted, &result, &context())
            .await;
    }
}
