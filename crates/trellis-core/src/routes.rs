//! # Route Table
//!
//! Ordered mapping from normalized URIs to page paths or component render
//! targets. Matching is exact-string only; URIs are normalized by trimming
//! slashes on both sides, and the last registration for a URI wins.

use std::collections::HashMap;

/// Target a route resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Execute the page registered under this path
    Page(String),
    /// Render the named component with the request inputs as parameters
    Render(String),
}

/// Static URI-to-target mapping
///
/// Populated once at application configuration time; immutable during a
/// request.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, RouteTarget>,
}

/// Trim slashes from both ends of a URI or page path
pub(crate) fn normalize(uri: &str) -> String {
    uri.trim_matches('/').to_string()
}

impl RouteTable {
    /// Create an empty route table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a URI to a page path
    pub fn page(&mut self, uri: &str, path: &str) -> &mut Self {
        self.routes
            .insert(normalize(uri), RouteTarget::Page(normalize(path)));
        self
    }

    /// Map a URI to a component render target
    pub fn render(&mut self, uri: &str, component: &str) -> &mut Self {
        self.routes
            .insert(normalize(uri), RouteTarget::Render(component.to_string()));
        self
    }

    /// Look up the target for a request URI (exact match after trimming)
    #[must_use]
    pub fn search(&self, uri: &str) -> Option<&RouteTarget> {
        self.routes.get(&normalize(uri))
    }

    /// Number of registered routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
