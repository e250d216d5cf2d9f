//! HTTP-facing error taxonomy for the `/mcp` surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Errors surfaced directly to the buyer over HTTP, as distinct from
/// payment-flow errors the bridge already resolves internally.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The `target` query parameter was missing or not a valid URL.
    #[error("missing or malformed target URL")]
    InvalidUrl,

    /// `target` parsed but used a scheme other than `http`/`https`.
    #[error("target URL must use http or https")]
    InvalidProtocol,

    /// A POST after the first message carried no `mcp-session-id` header.
    #[error("missing mcp-session-id header")]
    MissingSessionId,

    /// `mcp-session-id` named a session the registry has no entry for.
    #[error("unknown session")]
    UnknownSession,

    /// The bridge or a transport failed in a way that could not be routed
    /// back to the buyer as an ordinary JSON-RPC error.
    #[error("internal proxy error: {0}")]
    Internal(String),
}

impl ServerError {
    const fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidProtocol => "INVALID_PROTOCOL",
            Self::MissingSessionId => "MISSING_SESSION_ID",
            Self::UnknownSession => "UNKNOWN_SESSION",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUrl | Self::InvalidProtocol | Self::MissingSessionId => StatusCode::BAD_REQUEST,
            Self::UnknownSession => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": { "code": self.code(), "message": self.to_string() },
        });
        (status, Json(body)).into_response()
    }
}
