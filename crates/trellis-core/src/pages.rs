//! # Pages
//!
//! Registry of executable pages, standing in for a filesystem pages root.
//! A page "exists" when its normalized path is registered; a prefix denotes
//! a directory when at least one page sits strictly under it.

use crate::error::Result;
use crate::request::Request;
use crate::response::Response;
use crate::routes::normalize;
use std::collections::HashMap;
use std::sync::Arc;

/// What a page produced
#[derive(Debug)]
pub enum PageOutput {
    /// Body text captured into the response buffer
    Body(String),
    /// An explicit response object (body and status both apply)
    Response(Response),
    /// Sentinel for "no content"
    None,
}

/// An executable page
pub trait Page: Send + Sync {
    /// Run the page against the current request
    ///
    /// # Errors
    ///
    /// Any error propagates to the exception boundary.
    fn run(&self, req: &Request) -> Result<PageOutput>;
}

impl<F> Page for F
where
    F: Fn(&Request) -> Result<PageOutput> + Send + Sync,
{
    fn run(&self, req: &Request) -> Result<PageOutput> {
        self(req)
    }
}

/// Registry of pages keyed by normalized path
#[derive(Clone, Default)]
pub struct PageSet {
    pages: HashMap<String, Arc<dyn Page>>,
}

impl PageSet {
    /// Create an empty page set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page under a path (last registration wins)
    pub fn register(&mut self, path: &str, page: impl Page + 'static) -> &mut Self {
        self.pages.insert(normalize(path), Arc::new(page));
        self
    }

    /// Whether a page is registered under the path
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.pages.contains_key(&normalize(path))
    }

    /// Fetch the page registered under the path
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Arc<dyn Page>> {
        self.pages.get(&normalize(path)).cloned()
    }

    /// Whether the prefix denotes a directory of registered pages
    ///
    /// True when at least one page path sits strictly under the prefix,
    /// segment-wise. The root prefix covers every page.
    #[must_use]
    pub fn is_dir(&self, prefix: &str) -> bool {
        let prefix = normalize(prefix);
        if prefix.is_empty() {
            return !self.pages.is_empty();
        }
        let lead = format!("{prefix}/");
        self.pages.keys().any(|path| path.starts_with(&lead))
    }

    /// Number of registered pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether no pages are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl std::fmt::Debug for PageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSet")
            .field("paths", &self.pages.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(text: &'static str) -> impl Page {
        move |_req: &Request| Ok(PageOutput::Body(text.to_string()))
    }

    #[test]
    fn test_register_and_run() {
        let mut pages = PageSet::new();
        pages.register("home", body("welcome"));

        assert!(pages.contains("/home/"));
        let page = pages.get("home").unwrap();
        let out = page.run(&Request::get("/home")).unwrap();
        assert!(matches!(out, PageOutput::Body(ref b) if b == "welcome"));
    }

    #[test]
    fn test_missing_page() {
        let pages = PageSet::new();
        assert!(!pages.contains("nope"));
        assert!(pages.get("nope").is_none());
    }

    #[test]
    fn test_is_dir_segment_wise() {
        let mut pages = PageSet::new();
        pages.register("admin/users", body("users"));

        assert!(pages.is_dir("admin"));
        assert!(pages.is_dir("/admin/"));
        assert!(!pages.is_dir("admin/users"));
        assert!(!pages.is_dir("adm"));
        assert!(pages.is_dir("/"));
    }
}
