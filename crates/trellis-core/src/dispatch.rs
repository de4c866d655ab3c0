//! # Dispatcher
//!
//! Resolves a request URI to a concrete action, runs the middleware chain,
//! wraps page execution in lifecycle hooks and captures all output.
//!
//! Resolution precedence: exact route match, then the configured main page
//! for `/`, then a registered page path, then the configured not-found page,
//! then a bare 404. Requests carrying the [`COMPONENT_HEADER`] divert past
//! page execution entirely and are answered by the owning component.

use crate::engine::ComponentEngine;
use crate::error::Result;
use crate::lifecycle::LifecycleSet;
use crate::middleware::{MiddlewareSet, Validation};
use crate::pages::{PageOutput, PageSet};
use crate::request::Request;
use crate::response::Response;
use crate::routes::{normalize, RouteTable, RouteTarget};

/// Header identifying an asynchronous component call-back by its token
pub const COMPONENT_HEADER: &str = "x-app-component";

/// What a request URI resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Execute the page under this path inside the full pipeline
    Page(String),
    /// Render the named component with the request inputs as parameters
    Render(String),
    /// Run the configured not-found page directly, outside the pipeline
    NotFoundPage(String),
    /// Nothing matched; answer a bare 404
    Miss,
}

/// Resolves and executes one request against the configured registries
pub struct Dispatcher {
    routes: RouteTable,
    pages: PageSet,
    middlewares: MiddlewareSet,
    lifecycle: LifecycleSet,
    engine: ComponentEngine,
    main: String,
    not_found: String,
}

impl Dispatcher {
    /// Assemble a dispatcher from the configured registries
    ///
    /// `main` is substituted for the root URI; `not_found` is the page run
    /// when nothing else matches. Both are normalized here.
    #[must_use]
    pub fn new(
        routes: RouteTable,
        pages: PageSet,
        middlewares: MiddlewareSet,
        lifecycle: LifecycleSet,
        engine: ComponentEngine,
        main: &str,
        not_found: &str,
    ) -> Self {
        Self {
            routes,
            pages,
            middlewares,
            lifecycle,
            engine,
            main: normalize(main),
            not_found: normalize(not_found),
        }
    }

    /// Component engine backing render targets and asynchronous call-backs
    #[must_use]
    pub fn engine(&self) -> &ComponentEngine {
        &self.engine
    }

    /// Resolve a request URI to a concrete action
    #[must_use]
    pub fn resolve(&self, uri: &str) -> Resolution {
        if let Some(target) = self.routes.search(uri) {
            return match target {
                RouteTarget::Page(path) => Resolution::Page(path.clone()),
                RouteTarget::Render(name) => Resolution::Render(name.clone()),
            };
        }

        let mut path = normalize(uri);
        if path.is_empty() {
            path = self.main.clone();
        }
        if self.pages.contains(&path) {
            return Resolution::Page(path);
        }

        if !self.not_found.is_empty() && self.pages.contains(&self.not_found) {
            return Resolution::NotFoundPage(self.not_found.clone());
        }
        Resolution::Miss
    }

    /// Resolve and execute one request
    ///
    /// # Errors
    ///
    /// Errors raised by middlewares, hooks or pages propagate to the
    /// exception boundary in [`crate::Application`].
    pub fn run(&self, req: &Request) -> Result<Response> {
        match self.resolve(&req.path) {
            Resolution::Page(path) => self.execute(&path, req),
            Resolution::Render(name) => {
                Ok(Response::html(self.engine.render(&name, &req.inputs())))
            }
            Resolution::NotFoundPage(path) => self.run_throw_page(&path, req),
            Resolution::Miss => Ok(Response::json(
                &serde_json::json!({"message": "Page not found!"}),
            )
            .with_status(404)),
        }
    }

    /// Execute a resolved page path inside hooks, validation and capture
    ///
    /// Captured output accumulates header hook output, then page output (or
    /// the validation short-circuit body), then footer hook output. An
    /// asynchronous call-back identified by [`COMPONENT_HEADER`] is answered
    /// by the owning component alone; captured output is discarded.
    ///
    /// # Errors
    ///
    /// Errors raised by middlewares, hooks or pages propagate to the
    /// exception boundary.
    pub fn execute(&self, path: &str, req: &Request) -> Result<Response> {
        let setup = self.lifecycle.resolve(path);

        let mut captured = String::new();
        if let Some(header) = setup.header_hook() {
            captured.push_str(&header.on_load());
        }

        let mut response = Response::html(String::new());
        match self.middlewares.validate(path, req)? {
            Validation::Continue => {
                if let Some(token) = req.header(COMPONENT_HEADER) {
                    return Ok(self.divert_async(token, req));
                }

                match self.pages.get(path) {
                    Some(page) => match page.run(req)? {
                        PageOutput::Body(body) => captured.push_str(&body),
                        PageOutput::Response(resp) => {
                            captured.push_str(&resp.body);
                            response.status = resp.status;
                            response.content_type = resp.content_type;
                            response.headers = resp.headers;
                        }
                        PageOutput::None => {}
                    },
                    None => {
                        let missing =
                            Response::json(&serde_json::json!("Not Found")).with_status(404);
                        captured.push_str(&missing.body);
                        response.status = missing.status;
                        response.content_type = missing.content_type;
                    }
                }
            }
            Validation::ShortCircuit(resp) => {
                captured.push_str(&resp.body);
                response.status = resp.status;
                response.content_type = resp.content_type;
                response.headers = resp.headers;
            }
        }

        if let Some(footer) = setup.footer_hook() {
            captured.push_str(&footer.on_exit());
        }

        response.body = captured;
        Ok(response)
    }

    /// Asynchronous diversion: the component registered under the token
    /// answers alone; an unrecognized token is a 400
    fn divert_async(&self, token: &str, req: &Request) -> Response {
        self.engine.dispatch_async(token, req).unwrap_or_else(|| {
            Response::json(&serde_json::json!({"message": "Bad Request"})).with_status(400)
        })
    }

    /// Run the configured not-found page directly, without middlewares or
    /// hooks
    fn run_throw_page(&self, path: &str, req: &Request) -> Result<Response> {
        let Some(page) = self.pages.get(path) else {
            return Ok(
                Response::json(&serde_json::json!({"message": "Page not found!"}))
                    .with_status(404),
            );
        };
        Ok(match page.run(req)? {
            PageOutput::Body(body) => Response::html(body),
            PageOutput::Response(resp) => resp,
            PageOutput::None => Response::html(String::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentRegistry, Params, RenderContext};
    use crate::lifecycle::{FooterHook, HeaderHook, HookScope};
    use crate::middleware::Outcome;
    use crate::request::Method;
    use crate::session::{self, MemorySession};
    use hyper::body::Bytes;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct SiteHeader;

    impl HeaderHook for SiteHeader {
        fn on_load(&self) -> String {
            "<header/>".to_string()
        }
    }

    struct SiteFooter;

    impl FooterHook for SiteFooter {
        fn on_exit(&self) -> String {
            "<footer/>".to_string()
        }
    }

    struct Badge;

    impl Component for Badge {
        fn render(&self, _ctx: &RenderContext<'_>, params: &Params) -> String {
            let label = params.get("label").cloned().unwrap_or_default();
            format!("<span>{label}</span>")
        }

        fn async_action(
            &self,
            action: &str,
            _payload: &serde_json::Value,
            _req: &Request,
        ) -> Option<Response> {
            (action == "refresh").then(|| Response::json(&serde_json::json!({"ok": true})))
        }
    }

    struct Build {
        routes: RouteTable,
        pages: PageSet,
        middlewares: MiddlewareSet,
        lifecycle: LifecycleSet,
        registry: ComponentRegistry,
        session: Arc<MemorySession>,
    }

    impl Build {
        fn new() -> Self {
            Self {
                routes: RouteTable::new(),
                pages: PageSet::new(),
                middlewares: MiddlewareSet::new(),
                lifecycle: LifecycleSet::new(),
                registry: ComponentRegistry::new(),
                session: Arc::new(MemorySession::new()),
            }
        }

        fn dispatcher(self, main: &str, not_found: &str) -> Dispatcher {
            let engine = ComponentEngine::new(Arc::new(self.registry), self.session);
            Dispatcher::new(
                self.routes,
                self.pages,
                self.middlewares,
                self.lifecycle,
                engine,
                main,
                not_found,
            )
        }
    }

    fn body_page(text: &'static str) -> impl crate::pages::Page {
        move |_req: &Request| Ok(PageOutput::Body(text.to_string()))
    }

    #[test]
    fn test_resolve_route_beats_pages() {
        let mut build = Build::new();
        build.routes.page("login", "pages/login");
        build.pages.register("login", body_page("direct"));
        let dispatcher = build.dispatcher("", "");

        assert_eq!(
            dispatcher.resolve("/login/"),
            Resolution::Page("pages/login".to_string())
        );
    }

    #[test]
    fn test_resolve_root_substitutes_main() {
        let mut build = Build::new();
        build.pages.register("home", body_page("welcome"));
        let dispatcher = build.dispatcher("home", "");

        assert_eq!(dispatcher.resolve("/"), Resolution::Page("home".to_string()));
    }

    #[test]
    fn test_resolve_falls_back_to_not_found_page() {
        let mut build = Build::new();
        build.pages.register("notFound", body_page("gone"));
        let dispatcher = build.dispatcher("", "notFound");

        assert_eq!(
            dispatcher.resolve("/nowhere"),
            Resolution::NotFoundPage("notFound".to_string())
        );
    }

    #[test]
    fn test_resolve_miss() {
        let dispatcher = Build::new().dispatcher("", "notFound");
        assert_eq!(dispatcher.resolve("/nowhere"), Resolution::Miss);
    }

    #[test]
    fn test_run_miss_is_bare_404() {
        let dispatcher = Build::new().dispatcher("", "");
        let resp = dispatcher.run(&Request::get("/nowhere")).unwrap();

        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, r#"{"message":"Page not found!"}"#);
    }

    #[test]
    fn test_execute_captures_hooks_around_page() {
        let mut build = Build::new();
        build.pages.register("home", body_page("<main/>"));
        build
            .lifecycle
            .on(HookScope::Page("home".to_string()), |setup| {
                setup.header(SiteHeader).footer(SiteFooter);
            });
        let dispatcher = build.dispatcher("home", "");

        let resp = dispatcher.run(&Request::get("/")).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "<header/><main/><footer/>");
    }

    #[test]
    fn test_execute_short_circuit_body_captured_between_hooks() {
        let mut build = Build::new();
        build.pages.register("home", body_page("<main/>"));
        build.middlewares.add(|_req: &Request| Ok(Outcome::Reject));
        build
            .lifecycle
            .on(HookScope::Page("home".to_string()), |setup| {
                setup.header(SiteHeader).footer(SiteFooter);
            });
        let dispatcher = build.dispatcher("home", "");

        let resp = dispatcher.run(&Request::get("/")).unwrap();
        assert_eq!(resp.status, 401);
        assert_eq!(
            resp.body,
            format!("<header/>{}<footer/>", r#"{"message":"Unauthorized"}"#)
        );
    }

    #[test]
    fn test_execute_page_response_sets_status() {
        let mut build = Build::new();
        build.pages.register("gone", |_req: &Request| {
            Ok(PageOutput::Response(
                Response::text("moved away").with_status(410),
            ))
        });
        let dispatcher = build.dispatcher("", "");

        let resp = dispatcher.execute("gone", &Request::get("/gone")).unwrap();
        assert_eq!(resp.status, 410);
        assert_eq!(resp.body, "moved away");
    }

    #[test]
    fn test_execute_none_output_contributes_nothing() {
        let mut build = Build::new();
        build
            .pages
            .register("quiet", |_req: &Request| Ok(PageOutput::None));
        let dispatcher = build.dispatcher("", "");

        let resp = dispatcher.execute("quiet", &Request::get("/quiet")).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "");
    }

    #[test]
    fn test_execute_unregistered_route_target_is_404() {
        let mut build = Build::new();
        build.routes.page("login", "pages/login");
        let dispatcher = build.dispatcher("", "");

        let resp = dispatcher.run(&Request::get("/login")).unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, r#""Not Found""#);
    }

    #[test]
    fn test_not_found_page_runs_without_pipeline() {
        let mut build = Build::new();
        build.pages.register("notFound", body_page("custom 404"));
        build.middlewares.add(|_req: &Request| Ok(Outcome::Reject));
        let dispatcher = build.dispatcher("", "notFound");

        // The rejecting middleware never runs for the throw page
        let resp = dispatcher.run(&Request::get("/nowhere")).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "custom 404");
    }

    #[test]
    fn test_async_diversion_recognized_token() {
        let mut build = Build::new();
        build.registry.register("Badge", Badge);
        build.pages.register("home", body_page("unused"));
        session::store_component_token(build.session.as_ref(), "badge", "tok-1");
        let dispatcher = build.dispatcher("home", "");

        let mut headers = HashMap::new();
        headers.insert(COMPONENT_HEADER.to_string(), "tok-1".to_string());
        let req = Request::new(
            Method::Post,
            "/",
            headers,
            Some(Bytes::from(r#"{"refresh": {}}"#)),
        );

        let resp = dispatcher.run(&req).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, r#"{"ok":true}"#);
    }

    #[test]
    fn test_async_diversion_unknown_token_is_400() {
        let mut build = Build::new();
        build.pages.register("home", body_page("unused"));
        let dispatcher = build.dispatcher("home", "");

        let mut headers = HashMap::new();
        headers.insert(COMPONENT_HEADER.to_string(), "bogus".to_string());
        let req = Request::new(Method::Post, "/", headers, None);

        let resp = dispatcher.run(&req).unwrap();
        assert_eq!(resp.status, 400);
        assert_eq!(resp.body, r#"{"message":"Bad Request"}"#);
    }

    #[test]
    fn test_render_target_uses_request_inputs() {
        let mut build = Build::new();
        build.registry.register("Badge", Badge);
        build.routes.render("widget", "Badge");
        let dispatcher = build.dispatcher("", "");

        let resp = dispatcher.run(&Request::get("/widget?label=New")).unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.body.contains("<span>New</span>"));
    }

    #[test]
    fn test_page_error_propagates() {
        let mut build = Build::new();
        build.pages.register("boom", |_req: &Request| {
            Err(crate::Error::handler("page exploded"))
        });
        let dispatcher = build.dispatcher("", "");

        assert!(dispatcher.run(&Request::get("/boom")).is_err());
    }
}
