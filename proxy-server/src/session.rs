//! Process-wide session registry.
//!
//! One bridge per MCP session, keyed by the `mcp-session-id` the proxy mints
//! on the first message it sees with no session header. The registry's
//! lifecycle is the lifecycle of the proxy process — entries are removed
//! only by explicit `DELETE /mcp` or a bridge reporting its own close.

use std::sync::Arc;

use dashmap::DashMap;

use proxy_bridge::Bridge;
use proxy_treasurer::Treasurer;

use crate::transport::HttpServerTransport;

/// A session-scoped bridge, monomorphic over `Arc<dyn Treasurer>` so one
/// registry can hold sessions built against either treasurer implementation.
pub type SessionBridge = Bridge<Arc<dyn Treasurer>>;

/// Everything the HTTP layer needs for one live session: the bridge itself,
/// plus the buyer-facing transport the handler dispatches HTTP bodies into
/// (the bridge only exposes it as an opaque `dyn Transport`).
pub struct Session {
    /// The session's bridge.
    pub bridge: Arc<SessionBridge>,
    /// The session's buyer-facing transport.
    pub server_transport: Arc<HttpServerTransport>,
}

/// Concurrent map from session id to its session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl SessionRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }

    /// Registers `session` under `session_id`, overwriting any prior entry.
    pub fn insert(&self, session_id: String, session: Arc<Session>) {
        self.sessions.insert(session_id, session);
    }

    /// Looks up the session for `session_id`.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes `session_id`, returning its session if one was present.
    pub fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(session_id).map(|(_, session)| session)
    }

    /// `true` if `session_id` has a registered session.
    #[must_use]
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionRegistry;

    #[test]
    fn remove_is_idempotent_and_does_not_affect_other_sessions() {
        let registry = SessionRegistry::new();
        assert!(registry.remove("missing").is_none());
        assert!(!registry.contains("a"));
    }
}
