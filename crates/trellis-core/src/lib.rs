//! # Trellis Core
//!
//! Core runtime library for the Trellis framework.
//! Maps an incoming URI to a page or route handler, runs a middleware chain,
//! fires lifecycle hooks around page execution, and renders server-side
//! components carrying session-bound action identifiers for asynchronous
//! call-backs.
//!
//! ## Architecture
//!
//! The dispatch pipeline is synchronous and network-agnostic; the hyper
//! server in `server` is a thin adapter in front of it. One failure boundary
//! in `application` guarantees exactly one response per request.
//!
//! ## Modules
//!
//! - `application` - fluent configuration and the per-request entry point
//! - `server` - HTTP server built on Hyper
//! - `dispatch` - route resolution, validation and hook-wrapped execution
//! - `routes` - static URI-to-target mapping
//! - `pages` - executable page registry
//! - `middleware` - ordered, path-scoped validation chain
//! - `lifecycle` - header/footer hooks around page execution
//! - `exception` - exception routing and the diagnostic renderer
//! - `component` - component types, instances and action identifiers
//! - `engine` - the five-stage component rewrite pipeline
//! - `session` - session store interface and the component-token bucket
//! - `request` / `response` - HTTP wrappers decoupled from hyper
//! - `json` - high-performance JSON parsing with simd-json
//! - `config` - `.env`-style configuration provider
//! - `error` - error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod application;
pub mod component;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod exception;
pub mod json;
pub mod lifecycle;
pub mod middleware;
pub mod pages;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;
pub mod session;
mod template;

pub use application::{Application, Builder, MODULE_QUERY};
pub use component::{
    Component, ComponentInstance, ComponentRegistry, Params, RenderContext, ACTION_ID_LEN,
    CHILDREN_PARAM,
};
pub use config::Config;
pub use dispatch::{Dispatcher, Resolution, COMPONENT_HEADER};
pub use engine::{ComponentEngine, MISSING_COMPONENT};
pub use error::{Error, Result};
pub use exception::{ExceptionHandler, ExceptionSet, ERROR_PAGE};
pub use json::{parse_json, to_json};
pub use lifecycle::{FooterHook, HeaderHook, HookScope, LifecycleSet, Setup};
pub use middleware::{Middleware, MiddlewareSet, Outcome};
pub use pages::{Page, PageOutput, PageSet};
pub use request::{Method, Request};
pub use response::Response;
pub use routes::{RouteTable, RouteTarget};
pub use server::{Server, ServerConfig};
pub use session::{MemorySession, SessionStore, COMPONENT_BUCKET};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
