//! # Lifecycle Hooks
//!
//! Scope-matched header/footer hooks wrapped around page execution.
//!
//! Each registered entry names a scope (a single page or a directory of
//! pages) and a configure callback. When a request's resolved path matches,
//! the callback runs against a fresh [`Setup`] accumulator and whichever
//! hooks it declares overwrite those of earlier matching entries. Multiple
//! matches therefore do not compose; the last match wins per hook slot.

use crate::routes::normalize;
use std::sync::Arc;

/// Hook invoked before page execution; its output opens the response body
pub trait HeaderHook: Send + Sync {
    /// Produce the header markup
    fn on_load(&self) -> String;
}

/// Hook invoked after page execution; its output closes the response body
pub trait FooterHook: Send + Sync {
    /// Produce the footer markup
    fn on_exit(&self) -> String;
}

/// Accumulator handed to configure callbacks
///
/// Holds at most one header hook and one footer hook.
#[derive(Clone, Default)]
pub struct Setup {
    header: Option<Arc<dyn HeaderHook>>,
    footer: Option<Arc<dyn FooterHook>>,
}

impl Setup {
    /// Declare the header hook
    pub fn header(&mut self, hook: impl HeaderHook + 'static) -> &mut Self {
        self.header = Some(Arc::new(hook));
        self
    }

    /// Declare the footer hook
    pub fn footer(&mut self, hook: impl FooterHook + 'static) -> &mut Self {
        self.footer = Some(Arc::new(hook));
        self
    }

    pub(crate) fn header_hook(&self) -> Option<&Arc<dyn HeaderHook>> {
        self.header.as_ref()
    }

    pub(crate) fn footer_hook(&self) -> Option<&Arc<dyn FooterHook>> {
        self.footer.as_ref()
    }
}

/// Scope of a lifecycle entry
#[derive(Debug, Clone)]
pub enum HookScope {
    /// Exact page path
    Page(String),
    /// Every page under a directory (the root directory covers all pages)
    Directory(String),
}

type Configure = Arc<dyn Fn(&mut Setup) + Send + Sync>;

struct Entry {
    scope: HookScope,
    configure: Configure,
}

/// Ordered lifecycle registrations
#[derive(Clone, Default)]
pub struct LifecycleSet {
    entries: Vec<Arc<Entry>>,
}

/// Segment-wise directory containment
///
/// `admin` contains `admin/users` but not `admin2/users`; the empty (root)
/// directory contains every path.
pub(crate) fn in_directory(path: &str, dir: &str) -> bool {
    let dir = normalize(dir);
    if dir.is_empty() {
        return true;
    }
    let path = normalize(path);
    let mut path_segments = path.split('/');
    dir.split('/').all(|seg| path_segments.next() == Some(seg)) && path.len() > dir.len()
}

impl LifecycleSet {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a configure callback for a scope
    pub fn on(
        &mut self,
        scope: HookScope,
        configure: impl Fn(&mut Setup) + Send + Sync + 'static,
    ) -> &mut Self {
        self.entries.push(Arc::new(Entry {
            scope,
            configure: Arc::new(configure),
        }));
        self
    }

    /// Number of registered entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the hooks applying to a resolved page path
    pub(crate) fn resolve(&self, path: &str) -> Setup {
        let mut resolved = Setup::default();
        for entry in &self.entries {
            let matched = match &entry.scope {
                HookScope::Page(page) => normalize(page) == path,
                HookScope::Directory(dir) => in_directory(path, dir),
            };
            if !matched {
                continue;
            }

            let mut declared = Setup::default();
            (entry.configure)(&mut declared);
            if declared.header.is_some() {
                resolved.header = declared.header;
            }
            if declared.footer.is_some() {
                resolved.footer = declared.footer;
            }
        }
        resolved
    }
}
