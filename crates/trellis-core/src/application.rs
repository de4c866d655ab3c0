//! # Application
//!
//! Fluent configuration entry point and the per-request boundary.
//!
//! [`Application::configure`] opens a builder over the registries; `build`
//! assembles the dispatcher and the component engine around one session
//! store. [`Application::handle`] is the single request entry: it answers
//! the reserved `__module__` diagnostic channel first, then runs dispatch
//! inside the exception boundary, which also absorbs panics. Exactly one
//! response comes back per request.

use crate::component::ComponentRegistry;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::engine::ComponentEngine;
use crate::error::Error;
use crate::exception::ExceptionSet;
use crate::lifecycle::LifecycleSet;
use crate::middleware::MiddlewareSet;
use crate::pages::PageSet;
use crate::request::Request;
use crate::response::Response;
use crate::routes::RouteTable;
use crate::session::{self, MemorySession, SessionStore};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Reserved query parameter revealing which component owns a token
pub const MODULE_QUERY: &str = "__module__";

/// Configured application handling requests end to end
pub struct Application {
    config: Config,
    dispatcher: Dispatcher,
    exceptions: ExceptionSet,
    pages: PageSet,
    session: Arc<dyn SessionStore>,
}

/// Accumulates configuration before [`Builder::build`]
pub struct Builder {
    config: Config,
    routes: RouteTable,
    pages: PageSet,
    middlewares: MiddlewareSet,
    lifecycle: LifecycleSet,
    exceptions: ExceptionSet,
    registry: ComponentRegistry,
    session: Option<Arc<dyn SessionStore>>,
    main: String,
    not_found: String,
}

impl Application {
    /// Open a builder over the given configuration
    #[must_use]
    pub fn configure(config: Config) -> Builder {
        Builder {
            config,
            routes: RouteTable::new(),
            pages: PageSet::new(),
            middlewares: MiddlewareSet::new(),
            lifecycle: LifecycleSet::new(),
            exceptions: ExceptionSet::new(),
            registry: ComponentRegistry::new(),
            session: None,
            main: String::new(),
            not_found: String::new(),
        }
    }

    /// Application configuration values
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Session store shared by the dispatcher and the component engine
    #[must_use]
    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Component engine rendering against this application's session
    #[must_use]
    pub fn engine(&self) -> &ComponentEngine {
        self.dispatcher.engine()
    }

    /// Handle one request, producing exactly one response
    ///
    /// Nothing escapes this boundary: dispatch errors and panics are routed
    /// through the registered exception handlers or the default renderer.
    #[must_use]
    pub fn handle(&self, req: &Request) -> Response {
        if let Some(token) = req.query(MODULE_QUERY) {
            return self.reveal_module(token);
        }

        let failure = match catch_unwind(AssertUnwindSafe(|| self.dispatcher.run(req))) {
            Ok(Ok(response)) => return response,
            Ok(Err(err)) => err,
            Err(panic) => Error::handler(panic_message(panic.as_ref())),
        };

        error!(error = %failure, path = %req.path, "request failed");
        self.exceptions
            .route(&failure, req, self.config.development(), &self.pages)
    }

    /// Answer the `__module__` diagnostic channel
    ///
    /// A token registered in the session bucket reveals its owning component
    /// name. Otherwise development mode gets the registered names back and
    /// production degrades to a generic 401.
    fn reveal_module(&self, token: &str) -> Response {
        let components = session::component_tokens(self.session.as_ref());
        for (name, registered) in &components {
            if registered == token {
                return Response::html(format!("<center><h1><b>{name}</b></h1></center>"));
            }
        }

        if self.config.development() {
            let message = if token.is_empty() {
                "Token is required.".to_string()
            } else {
                format!("`{token}` is undefined")
            };
            Response::json(&serde_json::json!({
                "message": message,
                "components": components,
            }))
            .with_status(404)
        } else {
            Response::json(&serde_json::json!({"message": "Unauthorized"})).with_status(401)
        }
    }
}

impl Builder {
    /// Configure the route table
    #[must_use]
    pub fn with_routes(mut self, configure: impl FnOnce(&mut RouteTable)) -> Self {
        configure(&mut self.routes);
        self
    }

    /// Register executable pages
    #[must_use]
    pub fn pages(mut self, configure: impl FnOnce(&mut PageSet)) -> Self {
        configure(&mut self.pages);
        self
    }

    /// Configure the middleware chain
    #[must_use]
    pub fn with_middlewares(mut self, configure: impl FnOnce(&mut MiddlewareSet)) -> Self {
        configure(&mut self.middlewares);
        self
    }

    /// Configure lifecycle hooks around page execution
    #[must_use]
    pub fn with_page_init(mut self, configure: impl FnOnce(&mut LifecycleSet)) -> Self {
        configure(&mut self.lifecycle);
        self
    }

    /// Register exception handlers
    #[must_use]
    pub fn with_exceptions(mut self, configure: impl FnOnce(&mut ExceptionSet)) -> Self {
        configure(&mut self.exceptions);
        self
    }

    /// Register component types
    #[must_use]
    pub fn with_components(mut self, configure: impl FnOnce(&mut ComponentRegistry)) -> Self {
        configure(&mut self.registry);
        self
    }

    /// Inject the session store (defaults to a fresh in-memory store)
    #[must_use]
    pub fn session(mut self, store: impl SessionStore + 'static) -> Self {
        self.session = Some(Arc::new(store));
        self
    }

    /// Page substituted for the root URI
    #[must_use]
    pub fn main(mut self, page: &str) -> Self {
        self.main = page.to_string();
        self
    }

    /// Page run when nothing else matches
    #[must_use]
    pub fn throw_page(mut self, page: &str) -> Self {
        self.not_found = page.to_string();
        self
    }

    /// Assemble the application
    #[must_use]
    pub fn build(self) -> Application {
        let session = self
            .session
            .unwrap_or_else(|| Arc::new(MemorySession::new()));
        let engine = ComponentEngine::new(Arc::new(self.registry), session.clone());
        let dispatcher = Dispatcher::new(
            self.routes,
            self.pages.clone(),
            self.middlewares,
            self.lifecycle,
            engine,
            &self.main,
            &self.not_found,
        );

        Application {
            config: self.config,
            dispatcher,
            exceptions: self.exceptions,
            pages: self.pages,
            session,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic in request handler".to_string()
    }
}
