//! Remote-policy treasurer: asks a remote authorization service whether and
//! what to pay, authenticating once with a wallet-signed login message.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use proxy_core::PaymentRequirements;
use proxy_wallet::Wallet;

use crate::error::TreasurerError;
use crate::treasurer::{Authorization, BoxFuture, PaymentStatus, RequestContext, Treasurer};

/// Default request timeout for the authorize/events/login calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    address: String,
    message: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    expires_in_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeRequest<'a> {
    accepts: &'a [PaymentRequirements],
    session_id: &'a str,
    method: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeResponse {
    #[serde(default)]
    authorized: Vec<PaymentRequirements>,
    #[serde(default)]
    recommended_index: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventRequest<'a> {
    status: &'static str,
    authorization_id: &'a str,
    session_id: &'a str,
}

/// Asks a remote authorization service whether and what to pay.
///
/// Logs in once (SIWE-style wallet-signed message) under an internal mutex so
/// concurrent callers share a single authentication round-trip; the bearer
/// token and its expiry are cached afterward. Every `onPaymentRequired` call
/// posts the full `accepts[]` plus request context to an `authorize`
/// endpoint; every `onStatus` call posts fire-and-forget to an `events`
/// endpoint, with failures logged but never propagated.
pub struct RemotePolicyTreasurer {
    wallet: Arc<dyn Wallet>,
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for RemotePolicyTreasurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemotePolicyTreasurer")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RemotePolicyTreasurer {
    /// Builds a remote-policy treasurer targeting `base_url` (e.g.
    /// `https://policy.example.com`), with the default request timeout.
    #[must_use]
    pub fn new(wallet: Arc<dyn Wallet>, base_url: impl Into<String>) -> Self {
        Self {
            wallet,
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            token: Mutex::new(None),
        }
    }

    /// Overrides the default request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns a valid bearer token, logging in if the cache is empty or
    /// expired. Concurrent callers serialize on the same login round-trip.
    async fn bearer_token(&self) -> Result<String, TreasurerError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let message = format!(
            "Sign in to the x402 payment proxy policy service as {}",
            self.wallet.address()
        );
        let signature = self.wallet.sign_message(&message).await?;

        let request = LoginRequest {
            address: self.wallet.address().to_string(),
            message,
            signature,
        };
        let response = self
            .client
            .post(format!("{}/login", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| TreasurerError::AuthenticationFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TreasurerError::AuthenticationFailed(format!(
                "login returned status {}",
                response.status()
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| TreasurerError::AuthenticationFailed(e.to_string()))?;

        let token = body.token.clone();
        *guard = Some(CachedToken {
            token: body.token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in_seconds),
        });
        Ok(token)
    }
}

impl Treasurer for RemotePolicyTreasurer {
    fn on_payment_required<'a>(
        &'a self,
        requirements: &'a [PaymentRequirements],
        context: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Option<Authorization>, TreasurerError>> {
        Box::pin(async move {
            if requirements.is_empty() {
                return Ok(None);
            }

            let token = match self.bearer_token().await {
                Ok(token) => token,
                Err(e) => {
                    log_decline(&e);
                    return Ok(None);
                }
            };

            let request = AuthorizeRequest {
                accepts: requirements,
                session_id: &context.session_id,
                method: &context.method,
            };
            let sent = self
                .client
                .post(format!("{}/authorize", self.base_url))
                .timeout(self.timeout)
                .bearer_auth(token)
                .json(&request)
                .send()
                .await;

            let response = match sent {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    log_decline(&TreasurerError::AuthorizeRequestFailed(format!(
                        "status {}",
                        r.status()
                    )));
                    return Ok(None);
                }
                Err(e) => {
                    log_decline(&TreasurerError::AuthorizeRequestFailed(e.to_string()));
                    return Ok(None);
                }
            };

            let body: AuthorizeResponse = match response.json().await {
                Ok(b) => b,
                Err(e) => {
                    log_decline(&TreasurerError::AuthorizeRequestFailed(e.to_string()));
                    return Ok(None);
                }
            };

            if body.authorized.is_empty() {
                return Ok(None);
            }

            let chosen = match body.recommended_index {
                Some(index) => match body.authorized.get(index) {
                    Some(requirement) => requirement,
                    None => {
                        log_decline(&TreasurerError::RecommendationOutOfBounds);
                        return Ok(None);
                    }
                },
                None => &body.authorized[0],
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
            let status_str = match status {
                PaymentStatus::Sending => "sending",
                PaymentStatus::Accepted => "accepted",
                PaymentStatus::Rejected => "rejected",
                PaymentStatus::Declined => "declined",
                PaymentStatus::Error => "error",
            };
            let Ok(token) = self.bearer_token().await else {
                return;
            };
            let request = EventRequest {
                status: status_str,
                authorization_id: &authorization.authorization_id,
                session_id: &context.session_id,
            };
            // Event reporting is fire-and-forget: failures are logged, never
            // propagated back into the payment flow.
            let result = self
                .client
                .post(format!("{}/events", self.base_url))
                .timeout(self.timeout)
                .bearer_auth(token)
                .json(&request)
                .send()
                .await;
            if let Err(e) = result {
                log_event_failure(&e);
            }
        })
    }
}

fn log_decline(error: &TreasurerError) {
    #[cfg(feature = "telemetry")]
    tracing::warn!(error = %error, "treasurer declining payment");
    #[cfg(not(feature = "telemetry"))]
    let _ = error;
}

fn log_event_failure(error: &reqwest::Error) {
    #[cfg(feature = "telemetry")]
    tracing::warn!(error = %error, "event report failed");
    #[cfg(not(feature = "telemetry"))]
    let _ = error;
}

#[cfg(test)]
mod tests {
    use super::RemotePolicyTreasurer;
    use crate::treasurer::{PaymentStatus, RequestContext, Treasurer};
    use alloy_signer_local::PrivateKeySigner;
    use proxy_core::PaymentRequirements;
    use proxy_wallet::EoaWallet;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn requirement(pay_to: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_owned(),
            network: "base-sepolia".to_owned(),
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_owned(),
            pay_to: pay_to.to_owned(),
            max_amount_required: "10000".to_owned(),
            resource: "x".to_owned(),
            description: "d".to_owned(),
            mime_type: "application/json".to_owned(),
            max_timeout_seconds: 300,
            extra: Some(json!({ "name": "USDC", "version": "2" })),
        }
    }

    fn context() -> RequestContext {
        RequestContext {
            session_id: "s1".to_owned(),
            method: "tools/call".to_owned(),
        }
    }

    #[tokio::test]
    async fn no_requirements_declines_without_network_calls() {
        let server = MockServer::start().await;
        let wallet = Arc::new(EoaWallet::new(PrivateKeySigner::random(), 84532));
        let treasurer = RemotePolicyTreasurer::new(wallet, server.uri());

        let result = treasurer.on_payment_required(&[], &context()).await.expect("ok");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn authorizes_recommended_requirement() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "tok-1",
                "expiresInSeconds": 3600,
            })))
            .mount(&server)
            .await;

        let pay_to = PrivateKeySigner::random().address().to_string();
        Mock::given(method("POST"))
            .and(path("/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorized": [requirement(&pay_to)],
                "recommendedIndex": 0,
            })))
            .mount(&server)
            .await;

        let wallet = Arc::new(EoaWallet::new(PrivateKeySigner::random(), 84532));
        let treasurer = RemotePolicyTreasurer::new(wallet, server.uri());

        let reqs = vec![requirement(&pay_to)];
        let authorization = treasurer
            .on_payment_required(&reqs, &context())
            .await
            .expect("ok")
            .expect("authorized");
        assert_eq!(authorization.payment.network, "base-sepolia");
    }

    #[tokio::test]
    async fn out_of_bounds_recommendation_declines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "tok-1",
                "expiresInSeconds": 3600,
            })))
            .mount(&server)
            .await;

        let pay_to = PrivateKeySigner::random().address().to_string();
        Mock::given(method("POST"))
            .and(path("/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorized": [requirement(&pay_to)],
                "recommendedIndex": 5,
            })))
            .mount(&server)
            .await;

        let wallet = Arc::new(EoaWallet::new(PrivateKeySigner::random(), 84532));
        let treasurer = RemotePolicyTreasurer::new(wallet, server.uri());

        let reqs = vec![requirement(&pay_to)];
        let result = treasurer
            .on_payment_required(&reqs, &context())
            .await
            .expect("ok");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn login_is_cached_across_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "tok-1",
                "expiresInSeconds": 3600,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pay_to = PrivateKeySigner::random().address().to_string();
        Mock::given(method("POST"))
            .and(path("/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorized": [requirement(&pay_to)],
                "recommendedIndex": 0,
            })))
            .mount(&server)
            .await;

        let wallet = Arc::new(EoaWallet::new(PrivateKeySigner::random(), 84532));
        let treasurer = RemotePolicyTreasurer::new(wallet, server.uri());
        let reqs = vec![requirement(&pay_to)];

        treasurer.on_payment_required(&reqs, &context()).await.expect("ok");
        treasurer.on_payment_required(&reqs, &context()).await.expect("ok");
        // wiremock's `.expect(1)` on the login mock is verified on drop.
    }

    #[tokio::test]
    async fn event_reporting_failure_does_not_panic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "tok-1",
                "expiresInSeconds": 3600,
            })))
            .mount(&server)
            .await;
        // No /events mock registered: wiremock 404s, treated as a logged failure.

        let wallet = Arc::new(EoaWallet::new(PrivateKeySigner::random(), 84532));
        let treasurer = RemotePolicyTreasurer::new(wallet, server.uri());
        let authorization = crate::treasurer::Authorization::new(proxy_core::PaymentPayload::exact(
            "base-sepolia".to_owned(),
            proxy_core::ExactPayload {
                signature: "0xsig".to_owned(),
                authorization: proxy_core::Eip3009Authorization {
                    from: "0xfrom".to_owned(),
                    to: "0xto".to_owned(),
                    value: "1".to_owned(),
                    valid_after: proxy_core::UnixTimestamp::from_secs(0),
                    valid_before: proxy_core::UnixTimestamp::from_secs(1),
                    nonce: "0xnonce".to_owned(),
                },
            },
        ));
        treasurer
            .on_status(PaymentStatus::Accepted, &authorization, &context())
            .await;
    }
}
