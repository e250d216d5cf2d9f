//! Axum route handlers for the proxy's `/mcp` surface.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use proxy_bridge::{Bridge, Transport};
use proxy_middleware::X402Middleware;
use proxy_treasurer::Treasurer;

use crate::error::ServerError;
use crate::session::{Session, SessionRegistry};
use crate::transport::{HttpServerTransport, HttpUpstreamTransport};

const SESSION_HEADER: &str = "mcp-session-id";

/// Shared application state handed to every handler.
pub struct AppState {
    /// Live sessions, keyed by `mcp-session-id`.
    pub registry: Arc<SessionRegistry>,
    /// The process-wide treasurer, shared by every bridge.
    pub treasurer: Arc<dyn Treasurer>,
    /// HTTP client used by every session's upstream transport.
    pub http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct McpQuery {
    target: String,
}

fn validate_target(raw: &str) -> Result<Url, ServerError> {
    let url = Url::parse(raw).map_err(|_| ServerError::InvalidUrl)?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ServerError::InvalidProtocol);
    }
    Ok(url)
}

fn session_id_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

async fn new_session(state: &AppState, session_id: String, target: Url) -> Arc<Session> {
    let server_transport = HttpServerTransport::new();
    let upstream_transport = HttpUpstreamTransport::new(state.http_client.clone(), target);
    let middleware = X402Middleware::new(Arc::clone(&state.treasurer));

    let registry = Arc::clone(&state.registry);
    let close_session_id = session_id.clone();

    let server_dyn: Arc<dyn Transport> = Arc::clone(&server_transport) as Arc<dyn Transport>;
    let upstream_dyn: Arc<dyn Transport> = upstream_transport as Arc<dyn Transport>;

    let bridge = Arc::new(Bridge::new(
        session_id,
        server_dyn,
        upstream_dyn,
        middleware,
        move || {
            registry.remove(&close_session_id);
        },
        |error| tracing::warn!(%error, "bridge reported a transport error"),
    ));

    if let Err(error) = bridge.start().await {
        tracing::error!(%error, "failed to start session bridge");
    }

    Arc::new(Session { bridge, server_transport })
}

/// `POST /mcp?target=<url>`.
///
/// # Errors
///
/// Returns [`ServerError::InvalidUrl`] / [`ServerError::InvalidProtocol`] for
/// a malformed `target`, [`ServerError::UnknownSession`] if `mcp-session-id`
/// names no live session, or [`ServerError::Internal`] if dispatch fails.
pub async fn post_mcp(
    State(state): State<Arc<AppState>>,
    Query(query): Query<McpQuery>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ServerError> {
    let target = validate_target(&query.target)?;
    let existing_session_id = session_id_header(&headers);

    let (session, minted_session_id) = match existing_session_id {
        Some(session_id) => {
            let session = state.registry.get(&session_id).ok_or(ServerError::UnknownSession)?;
            (session, None)
        }
        None => {
            let session_id = uuid::Uuid::new_v4().to_string();
            let session = new_session(&state, session_id.clone(), target).await;
            state.registry.insert(session_id.clone(), Arc::clone(&session));
            (session, Some(session_id))
        }
    };

    let result = session
        .server_transport
        .dispatch(body)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let mut response = Json(result).into_response();
    if let Some(session_id) = minted_session_id
        && let Ok(value) = HeaderValue::from_str(&session_id)
    {
        response.headers_mut().insert(HeaderName::from_static(SESSION_HEADER), value);
    }
    Ok(response)
}

/// `DELETE /mcp` with `mcp-session-id`.
///
/// # Errors
///
/// Returns [`ServerError::MissingSessionId`] if the header is absent, or
/// [`ServerError::UnknownSession`] if it names no live session — idempotent,
/// repeating a delete for an already-removed session always 404s.
pub async fn delete_mcp(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<StatusCode, ServerError> {
    let session_id = session_id_header(&headers).ok_or(ServerError::MissingSessionId)?;
    let session = state.registry.remove(&session_id).ok_or(ServerError::UnknownSession)?;
    session
        .bridge
        .close()
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(StatusCode::OK)
}

/// `GET /healthz`.
pub async fn healthz() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Builds the `/mcp` + `/healthz` router over `state`.
pub fn mcp_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/mcp", axum::routing::post(post_mcp).delete(delete_mcp))
        .route("/healthz", axum::routing::get(healthz))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::{mcp_router, AppState};
    use crate::session::SessionRegistry;
    use alloy_signer_local::PrivateKeySigner;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use proxy_treasurer::NaiveTreasurer;
    use proxy_wallet::EoaWallet;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state() -> Arc<AppState> {
        let wallet = Arc::new(EoaWallet::new(PrivateKeySigner::random(), 84532));
        Arc::new(AppState {
            registry: Arc::new(SessionRegistry::new()),
            treasurer: Arc::new(NaiveTreasurer::new(wallet)),
            http_client: reqwest::Client::new(),
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn rejects_malformed_target_url() {
        let app = mcp_router(state());
        let request = Request::post("/mcp?target=not-a-url")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize" })).unwrap()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_non_http_target_protocol() {
        let app = mcp_router(state());
        let request = Request::post("/mcp?target=ftp://example.com")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize" })).unwrap()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn first_message_mints_session_and_forwards_ordinary_call() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": { "ok": true }
            })))
            .mount(&upstream)
            .await;

        let app = mcp_router(state());
        let target = format!("{}/", upstream.uri());
        let request = Request::post(format!("/mcp?target={target}"))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize" })).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("mcp-session-id").is_some());
        let body = body_json(response).await;
        assert_eq!(body["result"]["ok"], json!(true));
    }

    #[tokio::test]
    async fn unknown_session_id_is_rejected() {
        let app = mcp_router(state());
        let request = Request::post("/mcp?target=http://example.com")
            .header("content-type", "application/json")
            .header("mcp-session-id", "does-not-exist")
            .body(Body::from(serde_json::to_vec(&json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/call" })).unwrap()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_without_session_header_is_bad_request() {
        let app = mcp_router(state());
        let request = Request::delete("/mcp").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_unknown_session_is_not_found_and_idempotent() {
        let app = mcp_router(state());
        let request = Request::delete("/mcp")
            .header("mcp-session-id", "never-existed")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let second = Request::delete("/mcp")
            .header("mcp-session-id", "never-existed")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(second).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
