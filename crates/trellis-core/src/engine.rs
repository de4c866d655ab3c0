//! # Component Engine
//!
//! Expands one named component into final markup through a five-stage
//! rewrite pipeline:
//!
//! 1. container placeholder substitution (`<>` / `</>`);
//! 2. `$$.module` call sites gain the instance id;
//! 3. `$$.listen` event literals become derived action identifiers;
//! 4. `$$.ajax` call sites gain the instance token;
//! 5. nested custom tags expand recursively via the registry.
//!
//! The listener rewrite deliberately operates on the whole accumulated
//! document rather than per-component scope; with sibling components
//! sharing an event name the last-processed instance wins. The engine never
//! fails: unresolved nested tags expand to nothing and a top-level lookup
//! miss degrades to an inert placeholder comment.

use crate::component::{
    Component, ComponentInstance, ComponentRegistry, Params, RenderContext, CHILDREN_PARAM,
};
use crate::request::Request;
use crate::response::Response;
use crate::session::{self, SessionStore};
use crate::template::{self, Node};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::warn;

/// Nesting ceiling; expansion stops rather than recurse past it
const MAX_DEPTH: usize = 32;

/// Markup substituted when a top-level component lookup misses
pub const MISSING_COMPONENT: &str = "<!-- Component not found -->";

/// Renders components against one session
pub struct ComponentEngine {
    registry: Arc<ComponentRegistry>,
    session: Arc<dyn SessionStore>,
}

impl ComponentEngine {
    /// Create an engine over a registry and a session store
    #[must_use]
    pub fn new(registry: Arc<ComponentRegistry>, session: Arc<dyn SessionStore>) -> Self {
        Self { registry, session }
    }

    /// Registered component types
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Render a component by name
    ///
    /// A lookup miss logs a warning and yields [`MISSING_COMPONENT`].
    #[must_use]
    pub fn render(&self, name: &str, params: &Params) -> String {
        match self.registry.resolve(name) {
            Some((canonical, component)) => {
                self.render_resolved(&canonical, component.as_ref(), params, 0)
            }
            None => {
                warn!(component = name, "component is not found");
                MISSING_COMPONENT.to_string()
            }
        }
    }

    fn render_resolved(
        &self,
        canonical: &str,
        component: &dyn Component,
        params: &Params,
        depth: usize,
    ) -> String {
        let started = Instant::now();
        let instance =
            ComponentInstance::new(canonical, component.events(), self.session.as_ref());
        let ctx = RenderContext::new(&instance);

        let rendered = component.render(&ctx, params);
        let rendered = substitute_container(&rendered, &instance);
        let rendered = rewrite_module_calls(&rendered, &instance);
        let rendered = rewrite_listeners(rendered, &instance);
        let rendered = rewrite_ajax_calls(&rendered, &instance.token);
        let rendered = self.expand_custom_tags(rendered, depth);

        let millis = started.elapsed().as_secs_f64() * 1000.0;
        format!("<!-- rendered in {millis:.2}ms -->{rendered}")
    }

    /// Stage 5: expand nested custom tags over the scanned node list
    fn expand_custom_tags(&self, doc: String, depth: usize) -> String {
        let nodes = template::parse(&doc);
        if nodes.iter().all(|node| matches!(node, Node::Text(_))) {
            return doc;
        }
        if depth >= MAX_DEPTH {
            warn!("component nesting exceeds {MAX_DEPTH} levels, leaving tags unexpanded");
            return doc;
        }

        let mut out = String::with_capacity(doc.len());
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(&text),
                Node::Custom(tag) => {
                    // Unresolved tags are dropped, not an error
                    let Some((canonical, component)) = self.registry.resolve(&tag.name) else {
                        continue;
                    };
                    let mut params: Params = tag.attributes.into_iter().collect();
                    if let Some(children) = tag.children {
                        params.insert(CHILDREN_PARAM.to_string(), children);
                    }
                    out.push_str(&self.render_resolved(
                        &canonical,
                        component.as_ref(),
                        &params,
                        depth + 1,
                    ));
                }
            }
        }
        out
    }

    /// Dispatch an asynchronous call identified by a session-registered token
    ///
    /// Returns `None` when the token matches no component registered in the
    /// session bucket; the caller answers 400.
    #[must_use]
    pub fn dispatch_async(&self, token: &str, req: &Request) -> Option<Response> {
        let owner = session::component_for_token(self.session.as_ref(), token)?;
        let (_, component) = self.registry.resolve_folded(&owner)?;
        Some(self.run_async(component.as_ref(), req))
    }

    fn run_async(&self, component: &dyn Component, req: &Request) -> Response {
        let Some(bytes) = req.body_bytes() else {
            return bad_request();
        };
        let mut buf = bytes.to_vec();
        let Ok(payload) = crate::json::parse_json_bytes::<serde_json::Value>(&mut buf) else {
            return bad_request();
        };
        let Some(actions) = payload.as_object() else {
            return bad_request();
        };

        for (action, value) in actions {
            if let Some(response) = component.async_action(action, value, req) {
                return response;
            }
        }
        bad_request()
    }
}

/// Default responder for unrecognized asynchronous calls
fn bad_request() -> Response {
    Response::json(&serde_json::json!({"message": "Bad Request"})).with_status(400)
}

/// Stage 1: container placeholder substitution
///
/// The first `<>` becomes the wrapping `<div>` carrying the token and id,
/// the first `</>` becomes `</div>`; any further placeholders are deleted.
fn substitute_container(doc: &str, instance: &ComponentInstance) -> String {
    let container = format!(
        "<div data-module='{}' id='{}'>",
        instance.token, instance.id
    );
    let doc = replace_first_drop_rest(doc, "<>", &container);
    replace_first_drop_rest(&doc, "</>", "</div>")
}

fn replace_first_drop_rest(doc: &str, placeholder: &str, replacement: &str) -> String {
    match doc.find(placeholder) {
        Some(at) => {
            let mut out = String::with_capacity(doc.len() + replacement.len());
            out.push_str(&doc[..at]);
            out.push_str(replacement);
            out.push_str(&doc[at + placeholder.len()..].replace(placeholder, ""));
            out
        }
        None => doc.to_string(),
    }
}

fn module_call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\$\.module\(\s*(function\b|\()").expect("module call pattern")
    })
}

/// Stage 2: hand the instance id to `$$.module` registration call sites
///
/// Covers anonymous-function and arrow-function forms; a probe for an
/// already-inserted id keeps the rewrite idempotent.
fn rewrite_module_calls(doc: &str, instance: &ComponentInstance) -> String {
    let probe = format!("$$.module('{}'", instance.id);
    if doc.contains(&probe) {
        return doc.to_string();
    }
    module_call_pattern()
        .replace_all(doc, |caps: &regex::Captures<'_>| {
            format!("$$.module('{}', {}", instance.id, &caps[1])
        })
        .into_owned()
}

/// Stage 3: replace `$$.listen` event literals with action identifiers
///
/// Scans the whole document, both quote styles.
fn rewrite_listeners(mut doc: String, instance: &ComponentInstance) -> String {
    for (event, action) in &instance.events {
        for quote in ['\'', '"'] {
            let from = format!("$$.listen({quote}{event}{quote}");
            let to = format!("$$.listen({quote}{action}{quote}");
            doc = doc.replace(&from, &to);
        }
    }
    doc
}

/// Stage 4: append the instance token to single-argument `$$.ajax` calls
///
/// Quote-aware balanced scan; call sites that already pass a second
/// argument (or no argument at all) are left untouched.
fn rewrite_ajax_calls(doc: &str, token: &str) -> String {
    const NEEDLE: &str = "$$.ajax(";
    let mut out = String::with_capacity(doc.len());
    let mut rest = doc;

    while let Some(at) = rest.find(NEEDLE) {
        let args_start = at + NEEDLE.len();
        out.push_str(&rest[..args_start]);
        let args = &rest[args_start..];
        match scan_call(args) {
            Some(call) => {
                out.push_str(&args[..call.close]);
                if !call.has_top_level_comma && !args[..call.close].trim().is_empty() {
                    out.push_str(", '");
                    out.push_str(token);
                    out.push('\'');
                }
                rest = &args[call.close..];
            }
            None => {
                rest = args;
            }
        }
    }
    out.push_str(rest);
    out
}

struct CallSite {
    /// Byte offset of the closing parenthesis within the argument text
    close: usize,
    has_top_level_comma: bool,
}

/// Scan call arguments for the matching close paren and top-level commas
fn scan_call(args: &str) -> Option<CallSite> {
    let bytes = args.as_bytes();
    let mut parens = 1usize;
    let mut braces = 0usize;
    let mut brackets = 0usize;
    let mut has_comma = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                if i >= bytes.len() {
                    return None;
                }
            }
            b'(' => parens += 1,
            b')' => {
                parens -= 1;
                if parens == 0 {
                    return Some(CallSite {
                        close: i,
                        has_top_level_comma: has_comma,
                    });
                }
            }
            b'{' => braces += 1,
            b'}' => braces = braces.saturating_sub(1),
            b'[' => brackets += 1,
            b']' => brackets = brackets.saturating_sub(1),
            b',' if parens == 1 && braces == 0 && brackets == 0 => has_comma = true,
            _ => {}
        }
        i += 1;
    }
    None
}
