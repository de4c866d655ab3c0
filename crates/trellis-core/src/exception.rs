//! # Exception Routing
//!
//! Single failure boundary around the dispatch pipeline.
//!
//! Registered handlers are consulted in order; the first one producing a
//! response wins. With no handler (or all declining), the default renderer
//! answers: a structured diagnostic page in development mode, the registered
//! error page otherwise, and a bare 500 JSON payload when even that page is
//! missing. Exactly one response always comes back.

use crate::error::Error;
use crate::pages::{PageOutput, PageSet};
use crate::request::Request;
use crate::response::Response;
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Page path consulted for the generic error page outside development mode
pub const ERROR_PAGE: &str = "error";

/// A registered exception handler
pub trait ExceptionHandler: Send + Sync {
    /// Render a response for the error, or decline with `None`
    fn render(&self, error: &Error, req: &Request) -> Option<Response>;
}

impl<F> ExceptionHandler for F
where
    F: Fn(&Error, &Request) -> Option<Response> + Send + Sync,
{
    fn render(&self, error: &Error, req: &Request) -> Option<Response> {
        self(error, req)
    }
}

/// Ordered exception handler registrations
#[derive(Clone, Default)]
pub struct ExceptionSet {
    handlers: Vec<Arc<dyn ExceptionHandler>>,
}

impl ExceptionSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an exception handler
    pub fn handle(&mut self, handler: impl ExceptionHandler + 'static) -> &mut Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Number of registered handlers
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route an error to a response
    ///
    /// Never fails; the default renderer answers when every handler
    /// declines.
    pub(crate) fn route(
        &self,
        error: &Error,
        req: &Request,
        development: bool,
        pages: &PageSet,
    ) -> Response {
        for handler in &self.handlers {
            if let Some(response) = handler.render(error, req) {
                return response;
            }
        }
        default_response(error, req, development, pages)
    }
}

impl std::fmt::Debug for ExceptionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionSet")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Default renderer: diagnostic page in development, error page or bare 500
/// otherwise
fn default_response(error: &Error, req: &Request, development: bool, pages: &PageSet) -> Response {
    if development {
        return Response::html(diagnostic_page(error)).with_status(500);
    }

    if let Some(page) = pages.get(ERROR_PAGE) {
        // The error page must not raise past the boundary
        if let Ok(output) = page.run(req) {
            return match output {
                PageOutput::Body(body) => Response::html(body).with_status(500),
                PageOutput::Response(resp) => resp,
                PageOutput::None => internal_server_error(),
            };
        }
    }
    internal_server_error()
}

fn internal_server_error() -> Response {
    Response::json(&serde_json::json!({"message": "Internal Server Error!"})).with_status(500)
}

fn location_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r" in .*? on line \d+").expect("location suffix pattern"))
}

/// Strip the ` in <file> on line <n>` suffix some messages carry
pub(crate) fn sanitize_message(message: &str) -> String {
    location_suffix().replace_all(message, "").into_owned()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Structured diagnostic page shown in development mode
///
/// Includes the client-side lookup against the Stack Exchange search API,
/// keyed by the sanitized message.
fn diagnostic_page(error: &Error) -> String {
    let (file, line) = error
        .location()
        .map_or(("-".to_string(), "-".to_string()), |(file, line)| {
            (file.to_string(), line.to_string())
        });
    let cause = std::error::Error::source(error)
        .map_or("None".to_string(), std::string::ToString::to_string);
    let sanitized = sanitize_message(&error.to_string());
    let query = serde_json::to_string(&sanitized).unwrap_or_else(|_| "\"\"".to_string());

    let rows = [
        ("Exception Type:", error.kind().to_string()),
        ("Message:", error.to_string()),
        ("File:", file),
        ("Line:", line),
        ("Error Code:", error.code().to_string()),
        ("Previous Exception:", cause),
    ];
    let mut table = String::new();
    for (label, value) in rows {
        table.push_str(&format!(
            "<tr><td style=\"padding: 8px; border: 1px solid #f5c6cb;\"><strong>{label}</strong></td>\
             <td style=\"padding: 8px; border: 1px solid #f5c6cb;\">{}</td></tr>",
            escape_html(&value)
        ));
    }

    format!(
        "<div style=\"font-family: Arial, sans-serif; background-color: #f8d7da; color: #721c24; \
         padding: 20px; border: 1px solid #f5c6cb; border-radius: 5px; margin: 20px;\">\
         <h2>Exception Details</h2><hr style=\"border-color: #f5c6cb;\">\
         <table style=\"width: 100%; border-collapse: collapse;\">{table}</table>\
         <h3>Possible Related Issues</h3>\
         <div style=\"background-color: #f5f5f5; padding: 10px; border: 1px solid #ddd;\">\
         <div id=\"error-loader_\" style=\"width: 100%;text-align: center;\">Loading...</div>\
         <ul id=\"error-solution-links\" style=\"padding-left: 15px;font-size: 13px;margin: 0\"></ul>\
         </div></div>\
         <script>\
         async function searchStackOverflow(query) {{\
             const loader = document.getElementById('error-loader_');\
             const listElement = document.getElementById('error-solution-links');\
             const params = new URLSearchParams({{\
                 order: 'desc', sort: 'relevance', q: query,\
                 site: 'stackoverflow', pagesize: 10\
             }});\
             try {{\
                 const response = await fetch(\
                     `https://api.stackexchange.com/2.3/search/advanced?${{params.toString()}}`);\
                 if (!response.ok) throw new Error('Failed to fetch Stack Overflow data.');\
                 loader.style.display = 'none';\
                 const data = await response.json();\
                 listElement.innerHTML = '';\
                 if (data.items && data.items.length > 0) {{\
                     data.items.forEach(item => {{\
                         const listItem = document.createElement('li');\
                         const link = document.createElement('a');\
                         link.href = item.link;\
                         link.textContent = item.title;\
                         link.target = '_blank';\
                         listItem.appendChild(link);\
                         listElement.appendChild(listItem);\
                     }});\
                 }} else {{\
                     listElement.innerHTML = '<li>No results found.</li>';\
                 }}\
             }} catch (error) {{\
                 loader.style.display = 'none';\
                 listElement.innerHTML = '<li>Something went wrong.</li>';\
             }}\
         }}\
         searchStackOverflow({query});\
         </script>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages_with_error_page() -> PageSet {
        let mut pages = PageSet::new();
        pages.register(ERROR_PAGE, |_req: &Request| {
            Ok(PageOutput::Body("<h1>Something went wrong</h1>".to_string()))
        });
        pages
    }

    #[test]
    fn test_sanitize_message_strips_location_suffix() {
        assert_eq!(
            sanitize_message("Undefined variable in /srv/app/pages/home.html on line 12"),
            "Undefined variable"
        );
        assert_eq!(sanitize_message("plain message"), "plain message");
    }

    #[test]
    fn test_registered_handler_wins() {
        let mut set = ExceptionSet::new();
        set.handle(|_error: &Error, _req: &Request| {
            Some(Response::text("handled").with_status(503))
        });

        let resp = set.route(
            &Error::handler("boom"),
            &Request::get("/"),
            true,
            &PageSet::new(),
        );
        assert_eq!(resp.status, 503);
        assert_eq!(resp.body, "handled");
    }

    #[test]
    fn test_declining_handler_falls_through() {
        let mut set = ExceptionSet::new();
        set.handle(|_error: &Error, _req: &Request| None);
        set.handle(|_error: &Error, _req: &Request| Some(Response::text("second")));

        let resp = set.route(
            &Error::handler("boom"),
            &Request::get("/"),
            false,
            &PageSet::new(),
        );
        assert_eq!(resp.body, "second");
    }

    #[test]
    fn test_development_diagnostic_page() {
        let set = ExceptionSet::new();
        let error = Error::handler("template blew up in pages/home.html on line 3");
        let resp = set.route(&error, &Request::get("/"), true, &PageSet::new());

        assert_eq!(resp.status, 500);
        assert_eq!(resp.content_type, "text/html");
        assert!(resp.body.contains("HANDLER ERROR"));
        assert!(resp.body.contains("template blew up"));
        assert!(resp.body.contains("exception.rs"));
        assert!(resp.body.contains("searchStackOverflow"));
        // The embedded query is sanitized
        assert!(resp.body.contains("\"template blew up\""));
    }

    #[test]
    fn test_non_development_uses_error_page() {
        let set = ExceptionSet::new();
        let resp = set.route(
            &Error::handler("boom"),
            &Request::get("/"),
            false,
            &pages_with_error_page(),
        );

        assert_eq!(resp.status, 500);
        assert_eq!(resp.body, "<h1>Something went wrong</h1>");
        assert!(!resp.body.contains("boom"));
    }

    #[test]
    fn test_non_development_without_error_page_is_bare_500() {
        let set = ExceptionSet::new();
        let resp = set.route(
            &Error::handler("boom"),
            &Request::get("/"),
            false,
            &PageSet::new(),
        );

        assert_eq!(resp.status, 500);
        assert_eq!(resp.body, r#"{"message":"Internal Server Error!"}"#);
    }

    #[test]
    fn test_failing_error_page_still_answers() {
        let mut pages = PageSet::new();
        pages.register(ERROR_PAGE, |_req: &Request| {
            Err(Error::handler("error page exploded"))
        });

        let set = ExceptionSet::new();
        let resp = set.route(&Error::handler("boom"), &Request::get("/"), false, &pages);
        assert_eq!(resp.status, 500);
        assert_eq!(resp.body, r#"{"message":"Internal Server Error!"}"#);
    }

    #[test]
    fn test_diagnostic_shows_cause_chain() {
        let error = Error::handler("outer").caused_by(Error::handler("root cause"));
        let page = diagnostic_page(&error);
        assert!(page.contains("root cause"));
    }
}
