//! # Components
//!
//! Server-rendered HTML fragments carrying session-bound action identifiers.
//!
//! A component type declares a fixed list of logical event names. Every
//! render constructs a fresh [`ComponentInstance`]: a randomized instance
//! id, the per-session per-type token (created once and cached in session
//! storage), and the derived action identifier for each declared event.
//! The token is the persistent artifact; instances never outlive a render.

use crate::request::Request;
use crate::response::Response;
use crate::session::{self, SessionStore};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Parameters passed to a component render
pub type Params = HashMap<String, String>;

/// Reserved parameter carrying nested markup into a component
pub const CHILDREN_PARAM: &str = "children";

/// Truncated length of derived action identifiers, in hex characters
pub const ACTION_ID_LEN: usize = 16;

/// A renderable component type
pub trait Component: Send + Sync {
    /// Logical event names this component exposes to the client
    fn events(&self) -> &[&'static str] {
        &[]
    }

    /// Produce the raw template for this render
    ///
    /// The template may contain `<>`/`</>` container placeholders, client
    /// call sites (`$$.module`, `$$.listen`, `$$.ajax`) and nested custom
    /// tags; the engine rewrites all of them afterwards.
    fn render(&self, ctx: &RenderContext<'_>, params: &Params) -> String;

    /// Handle an asynchronous call-back for one logical action name
    ///
    /// Return `None` for unrecognized names; the engine then answers with
    /// the default bad-request response.
    fn async_action(
        &self,
        _action: &str,
        _payload: &serde_json::Value,
        _req: &Request,
    ) -> Option<Response> {
        None
    }
}

/// Registry mapping component type names to their implementations
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Arc<dyn Component>>,
    namespace: String,
}

impl ComponentRegistry {
    /// Create an empty registry with the conventional `includes` namespace
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: HashMap::new(),
            namespace: "includes".to_string(),
        }
    }

    /// Override the fallback namespace prefix
    pub fn namespace(&mut self, namespace: &str) -> &mut Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Register a component type under a name (last registration wins)
    pub fn register(&mut self, name: &str, component: impl Component + 'static) -> &mut Self {
        self.components.insert(name.to_string(), Arc::new(component));
        self
    }

    /// Resolve a name to its registered component
    ///
    /// Tries the bare name first, then the namespaced fallback
    /// (`<namespace>.<name>`). Returns the canonical registered name
    /// alongside the component.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<(String, Arc<dyn Component>)> {
        if let Some(component) = self.components.get(name) {
            return Some((name.to_string(), component.clone()));
        }
        let namespaced = format!("{}.{name}", self.namespace);
        self.components
            .get(&namespaced)
            .map(|component| (namespaced, component.clone()))
    }

    /// Resolve a lowercased name, as stored in the session token bucket
    #[must_use]
    pub(crate) fn resolve_folded(&self, folded: &str) -> Option<(String, Arc<dyn Component>)> {
        self.components
            .iter()
            .find(|(name, _)| name.to_lowercase() == folded)
            .map(|(name, component)| (name.clone(), component.clone()))
    }

    /// Registered component names
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.components.keys().map(String::as_str).collect()
    }

    /// Number of registered components
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Per-render state of one component
///
/// Constructed fresh for every render invocation, nested renders included.
#[derive(Debug, Clone)]
pub struct ComponentInstance {
    /// Lowercased component type name
    pub name: String,
    /// Request-local randomized identifier
    pub id: String,
    /// Per-session per-type token, cached in session storage
    pub token: String,
    /// Declared logical event names mapped to derived action identifiers
    pub events: BTreeMap<String, String>,
}

impl ComponentInstance {
    /// Construct the instance for one render
    ///
    /// Looks the token up in the session bucket, creating and caching it on
    /// first use for this component type.
    #[must_use]
    pub fn new(name: &str, declared: &[&'static str], store: &dyn SessionStore) -> Self {
        let name = name.to_lowercase();
        let token = ensure_token(store, &name);
        let id = instance_id(&name);
        let events = declared
            .iter()
            .map(|event| ((*event).to_string(), action_id(event, &id, &token)))
            .collect();

        Self {
            name,
            id,
            token,
            events,
        }
    }
}

/// Render-scoped view of a [`ComponentInstance`] handed to templates
#[derive(Debug)]
pub struct RenderContext<'a> {
    instance: &'a ComponentInstance,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(instance: &'a ComponentInstance) -> Self {
        Self { instance }
    }

    /// Instance identifier for this render
    #[must_use]
    pub fn id(&self) -> &str {
        &self.instance.id
    }

    /// Hidden form field carrying the instance token
    #[must_use]
    pub fn token_field(&self) -> String {
        format!(
            "<input type=\"hidden\" name=\"token\" value=\"{}\" />",
            self.instance.token
        )
    }

    /// Derived action identifier for a declared event name
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&str> {
        self.instance.events.get(name).map(String::as_str)
    }
}

/// Fetch or create the session token for a component type
fn ensure_token(store: &dyn SessionStore, name: &str) -> String {
    if let Some(token) = session::component_token(store, name) {
        return token;
    }
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    let token = hex::encode(bytes);
    session::store_component_token(store, name, &token);
    token
}

/// Randomized request-local instance identifier
///
/// Width tracks the type name length (clamped), so distinct component types
/// tend to produce visually distinct ids. Uniqueness across processes is not
/// guaranteed; the collision risk is accepted.
fn instance_id(name: &str) -> String {
    let width = name.len().clamp(8, 32) / 2;
    let mut bytes = vec![0u8; width];
    rand::thread_rng().fill(bytes.as_mut_slice());
    hex::encode(bytes)
}

/// Derive the opaque action identifier for one logical event
///
/// Deterministic over `(event, instance id, session token)` and truncated;
/// a convenience obfuscation, not a cryptographic guarantee.
pub(crate) fn action_id(event: &str, id: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.as_bytes());
    hasher.update(id.as_bytes());
    hasher.update(token.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..ACTION_ID_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;

    struct Badge;

    impl Component for Badge {
        fn events(&self) -> &[&'static str] {
            &["refresh", "dismiss"]
        }

        fn render(&self, _ctx: &RenderContext<'_>, _params: &Params) -> String {
            "<span>badge</span>".to_string()
        }
    }

    #[test]
    fn test_token_stable_within_session() {
        let store = MemorySession::new();
        let first = ComponentInstance::new("Badge", &[], &store);
        let second = ComponentInstance::new("Badge", &[], &store);

        assert_eq!(first.token, second.token);
        assert_eq!(first.token.len(), 32);
    }

    #[test]
    fn test_token_differs_across_sessions() {
        let a = ComponentInstance::new("Badge", &[], &MemorySession::new());
        let b = ComponentInstance::new("Badge", &[], &MemorySession::new());
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_instance_ids_randomized() {
        let store = MemorySession::new();
        let first = ComponentInstance::new("Badge", &[], &store);
        let second = ComponentInstance::new("Badge", &[], &store);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_events_derived_per_instance() {
        let store = MemorySession::new();
        let instance = ComponentInstance::new("Badge", &["refresh"], &store);

        let derived = instance.events.get("refresh").unwrap();
        assert_eq!(derived.len(), ACTION_ID_LEN);
        assert_eq!(
            derived,
            &action_id("refresh", &instance.id, &instance.token)
        );
    }

    #[test]
    fn test_action_id_deterministic() {
        let a = action_id("submit", "id1", "tok1");
        let b = action_id("submit", "id1", "tok1");
        let c = action_id("submit", "id2", "tok1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_registry_resolve_with_namespace_fallback() {
        let mut registry = ComponentRegistry::new();
        registry.register("includes.Badge", Badge);

        let (canonical, _) = registry.resolve("Badge").unwrap();
        assert_eq!(canonical, "includes.Badge");
        assert!(registry.resolve("Missing").is_none());
    }

    #[test]
    fn test_registry_resolve_folded() {
        let mut registry = ComponentRegistry::new();
        registry.register("Badge", Badge);

        let (canonical, _) = registry.resolve_folded("badge").unwrap();
        assert_eq!(canonical, "Badge");
    }

    #[test]
    fn test_render_context_accessors() {
        let store = MemorySession::new();
        let instance = ComponentInstance::new("Badge", &["refresh"], &store);
        let ctx = RenderContext::new(&instance);

        assert_eq!(ctx.id(), instance.id);
        assert!(ctx.token_field().contains(&instance.token));
        assert!(ctx.event("refresh").is_some());
        assert!(ctx.event("unknown").is_none());
    }
}
