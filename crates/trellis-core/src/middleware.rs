//! # Middleware Chain
//!
//! Ordered, path-scoped validation steps run before page execution.
//!
//! Entries execute in registration order against the fully qualified target
//! path. The chain short-circuits on the first entry that rejects (401) or
//! that produces a non-200 response of its own; a 200 response from a
//! middleware is dropped and the chain continues.

use crate::error::Result;
use crate::request::Request;
use crate::response::Response;
use crate::routes::normalize;
use std::sync::Arc;

/// Result of one middleware invocation
#[derive(Debug)]
pub enum Outcome {
    /// Continue to the next entry
    Pass,
    /// Explicit rejection; the chain answers 401 Unauthorized
    Reject,
    /// The middleware produced its own response; non-200 aborts the chain
    Respond(Response),
}

/// A validation/action step in the chain
pub trait Middleware: Send + Sync {
    /// Inspect the request and decide whether dispatch may continue
    ///
    /// # Errors
    ///
    /// Any error propagates to the exception boundary.
    fn handle(&self, req: &Request) -> Result<Outcome>;

    /// Middleware name for logging
    fn name(&self) -> &'static str {
        "middleware"
    }
}

impl<F> Middleware for F
where
    F: Fn(&Request) -> Result<Outcome> + Send + Sync,
{
    fn handle(&self, req: &Request) -> Result<Outcome> {
        self(req)
    }
}

/// Path scope of a middleware entry
#[derive(Debug, Clone)]
enum Scope {
    /// Applies to every request
    All,
    /// Applies only when the resolved page path equals this path
    Path(String),
}

struct Entry {
    scope: Scope,
    action: Arc<dyn Middleware>,
}

/// Verdict of running the chain
pub(crate) enum Validation {
    /// All applicable entries passed
    Continue,
    /// An entry aborted the chain with this response
    ShortCircuit(Response),
}

/// Ordered middleware registrations
#[derive(Clone, Default)]
pub struct MiddlewareSet {
    entries: Vec<Arc<Entry>>,
}

impl MiddlewareSet {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a middleware applying to every request
    pub fn add(&mut self, action: impl Middleware + 'static) -> &mut Self {
        self.entries.push(Arc::new(Entry {
            scope: Scope::All,
            action: Arc::new(action),
        }));
        self
    }

    /// Register a middleware scoped to one resolved page path
    pub fn add_for(&mut self, path: &str, action: impl Middleware + 'static) -> &mut Self {
        self.entries.push(Arc::new(Entry {
            scope: Scope::Path(normalize(path)),
            action: Arc::new(action),
        }));
        self
    }

    /// Number of registered entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the chain against a resolved page path
    pub(crate) fn validate(&self, resolved: &str, req: &Request) -> Result<Validation> {
        for entry in &self.entries {
            let applies = match &entry.scope {
                Scope::All => true,
                Scope::Path(path) => path == resolved,
            };
            if !applies {
                continue;
            }

            match entry.action.handle(req)? {
                Outcome::Pass => {}
                Outcome::Reject => {
                    tracing::debug!(middleware = entry.action.name(), "request rejected");
                    return Ok(Validation::ShortCircuit(
                        Response::json(&serde_json::json!({"message": "Unauthorized"}))
                            .with_status(401),
                    ));
                }
                Outcome::Respond(response) => {
                    if response.status != 200 {
                        return Ok(Validation::ShortCircuit(response));
                    }
                }
            }
        }
        Ok(Validation::Continue)
    }
}
