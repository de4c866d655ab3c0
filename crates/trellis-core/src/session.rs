//! # Session Storage
//!
//! Explicit session-store interface injected into the dispatcher and the
//! component engine, plus the codec for the per-session component-token
//! bucket.
//!
//! Component tokens live in a single session value under
//! [`COMPONENT_BUCKET`], serialized as a JSON object mapping the lowercased
//! component name to its token. Writes are read-modify-write with
//! last-writer-wins semantics; concurrent requests racing to create a token
//! for the same component is an accepted benign race, since either winner is
//! a valid token.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Session key holding the component-token bucket.
pub const COMPONENT_BUCKET: &str = "app-component";

/// Key/value session storage scoped to one logical session
///
/// Teardown is an external collaborator's responsibility; this core only
/// reads and appends.
pub trait SessionStore: Send + Sync {
    /// Retrieve a session value
    fn get(&self, key: &str) -> Option<String>;

    /// Store or overwrite a session value
    fn set(&self, key: &str, value: String);

    /// Whether a session key is present
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// In-memory session store
///
/// One instance per logical session; cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct MemorySession {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySession {
    /// Create a new empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        let data = self.data.read().expect("Session lock poisoned");
        data.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut data = self.data.write().expect("Session lock poisoned");
        data.insert(key.to_string(), value);
    }

    fn has(&self, key: &str) -> bool {
        let data = self.data.read().expect("Session lock poisoned");
        data.contains_key(key)
    }
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.read().expect("Session lock poisoned");
        f.debug_struct("MemorySession")
            .field("keys", &data.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Decode the component-token bucket for a session
///
/// Missing or malformed buckets decode as empty.
#[must_use]
pub fn component_tokens(session: &dyn SessionStore) -> BTreeMap<String, String> {
    session
        .get(COMPONENT_BUCKET)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

/// Register a component token in the session bucket
///
/// Overwrites any previous token for the same component name.
pub fn store_component_token(session: &dyn SessionStore, name: &str, token: &str) {
    let mut tokens = component_tokens(session);
    tokens.insert(name.to_string(), token.to_string());
    if let Ok(raw) = serde_json::to_string(&tokens) {
        session.set(COMPONENT_BUCKET, raw);
    }
}

/// Look up the token registered for a component name
#[must_use]
pub fn component_token(session: &dyn SessionStore, name: &str) -> Option<String> {
    component_tokens(session).remove(name)
}

/// Reverse lookup: which component name owns the given token
#[must_use]
pub fn component_for_token(session: &dyn SessionStore, token: &str) -> Option<String> {
    component_tokens(session)
        .into_iter()
        .find(|(_, registered)| registered == token)
        .map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_session_round_trip() {
        let session = MemorySession::new();
        assert!(!session.has("user"));

        session.set("user", "amelia".to_string());
        assert_eq!(session.get("user"), Some("amelia".to_string()));
        assert!(session.has("user"));
    }

    #[test]
    fn test_memory_session_shared_across_clones() {
        let session = MemorySession::new();
        let other = session.clone();
        other.set("k", "v".to_string());
        assert_eq!(session.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_bucket_round_trip() {
        let session = MemorySession::new();
        store_component_token(&session, "loginform", "abc123");
        store_component_token(&session, "badge", "def456");

        assert_eq!(
            component_token(&session, "loginform"),
            Some("abc123".to_string())
        );
        let tokens = component_tokens(&session);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_bucket_overwrite_last_writer_wins() {
        let session = MemorySession::new();
        store_component_token(&session, "badge", "first");
        store_component_token(&session, "badge", "second");
        assert_eq!(component_token(&session, "badge"), Some("second".to_string()));
    }

    #[test]
    fn test_component_for_token() {
        let session = MemorySession::new();
        store_component_token(&session, "badge", "tok-1");

        assert_eq!(
            component_for_token(&session, "tok-1"),
            Some("badge".to_string())
        );
        assert_eq!(component_for_token(&session, "tok-2"), None);
    }

    #[test]
    fn test_malformed_bucket_decodes_empty() {
        let session = MemorySession::new();
        session.set(COMPONENT_BUCKET, "not json".to_string());
        assert!(component_tokens(&session).is_empty());
    }
}
