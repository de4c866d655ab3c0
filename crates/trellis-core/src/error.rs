//! # Error Handling
//!
//! Centralized error types for the Trellis core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Failures inside user-supplied pages, middlewares and hooks are wrapped in
//! [`Error::Handler`], which records the construction site so the diagnostic
//! renderer can point at an origin.

use thiserror::Error;

/// Result type alias for Trellis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Trellis runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    Bind {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// No page is registered under the resolved path
    #[error("No page registered for path: {path}")]
    PageNotFound {
        /// The path that wasn't registered
        path: String,
    },

    /// Configuration file could not be read
    #[error("Failed to load configuration from {path}: {source}")]
    Config {
        /// The file we tried to read
        path: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Request payload was not valid JSON
    #[error("Invalid JSON payload: {reason}")]
    Payload {
        /// Parser diagnostic
        reason: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A page, middleware or hook reported a failure
    #[error("{message}")]
    Handler {
        /// Failure description
        message: String,
        /// Status-like error code supplied by the origin
        code: u16,
        /// Source file of the construction site
        file: &'static str,
        /// Line of the construction site
        line: u32,
        /// Optional underlying cause
        #[source]
        source: Option<Box<Error>>,
    },
}

impl Error {
    /// Wrap a handler failure, capturing the caller's file and line.
    #[track_caller]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::handler_with_code(message, 500)
    }

    /// Wrap a handler failure with an explicit error code.
    #[track_caller]
    pub fn handler_with_code(message: impl Into<String>, code: u16) -> Self {
        let location = std::panic::Location::caller();
        Self::Handler {
            message: message.into(),
            code,
            file: location.file(),
            line: location.line(),
            source: None,
        }
    }

    /// Attach an underlying cause to a handler failure.
    ///
    /// No-op for other variants.
    #[must_use]
    pub fn caused_by(mut self, cause: Self) -> Self {
        if let Self::Handler { source, .. } = &mut self {
            *source = Some(Box::new(cause));
        }
        self
    }

    /// Short uppercase label naming the failure class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bind { .. } => "BIND ERROR",
            Self::PageNotFound { .. } => "PAGE NOT FOUND",
            Self::Config { .. } => "CONFIG ERROR",
            Self::Payload { .. } => "PAYLOAD ERROR",
            Self::Json(_) => "JSON ERROR",
            Self::Http(_) => "HTTP ERROR",
            Self::Io(_) => "IO ERROR",
            Self::Handler { .. } => "HANDLER ERROR",
        }
    }

    /// Error code reported on the diagnostic page.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::PageNotFound { .. } => 404,
            Self::Handler { code, .. } => *code,
            _ => 500,
        }
    }

    /// Construction site for handler failures, if recorded.
    #[must_use]
    pub fn location(&self) -> Option<(&'static str, u32)> {
        match self {
            Self::Handler { file, line, .. } => Some((file, *line)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_not_found_display() {
        let err = Error::PageNotFound {
            path: "admin/users".to_string(),
        };
        assert!(err.to_string().contains("admin/users"));
        assert_eq!(err.code(), 404);
    }

    #[test]
    fn test_handler_records_location() {
        let err = Error::handler("boom");
        let (file, line) = err.location().unwrap();
        assert!(file.ends_with("error.rs"));
        assert!(line > 0);
        assert_eq!(err.code(), 500);
    }

    #[test]
    fn test_handler_cause_chain() {
        let err = Error::handler("outer").caused_by(Error::handler("inner"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "inner");
    }

    #[test]
    fn test_bind_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = Error::Bind {
            address: "0.0.0.0:8080".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("0.0.0.0:8080"));
    }
}
