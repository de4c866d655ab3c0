//! # HTTP Response
//!
//! Response value produced by every stage of the pipeline: pages,
//! middlewares, the component engine and the exception boundary all hand one
//! back. Conversion to the wire format lives in [`crate::server`].

use serde::Serialize;
use std::collections::HashMap;

/// HTTP response assembled by the dispatch pipeline
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Additional response headers
    pub headers: HashMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: "text/html".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl Response {
    /// Create a JSON response from any serializable value
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        Self {
            status: 200,
            body: serde_json::to_string(value).unwrap_or_else(|_| "null".to_string()),
            content_type: "application/json".to_string(),
            headers: HashMap::new(),
        }
    }

    /// Create an HTML response
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: "text/html".to_string(),
            headers: HashMap::new(),
        }
    }

    /// Create a plain-text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: "text/plain".to_string(),
            headers: HashMap::new(),
        }
    }

    /// Set the status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_string(), value.to_string());
        }
    }
}
