//! # Configuration
//!
//! Key/value configuration provider loaded from `.env`-style text.
//!
//! Lines are `KEY=value`; `#` comment lines and lines without `=` are
//! skipped, surrounding single or double quotes on values are trimmed.
//! The provider is a plain value handed to [`crate::Application`] at
//! configuration time, never ambient state.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Key recognized by [`Config::development`].
pub const DEVELOPMENT_KEY: &str = "development";

/// Application configuration values
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    /// Create an empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from `.env`-style text
    #[must_use]
    pub fn from_str(text: &str) -> Self {
        let mut values = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            values.insert(key.trim().to_string(), value.to_string());
        }
        Self { values }
    }

    /// Load configuration from a file on disk
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Config {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_str(&text))
    }

    /// Get a configuration value by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a configuration value, falling back to a default
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Set or override a configuration value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Whether the application runs in development mode
    ///
    /// Truthy values: `1`, `true`, `on`, `yes` (case-insensitive).
    #[must_use]
    pub fn development(&self) -> bool {
        self.get(DEVELOPMENT_KEY).is_some_and(|v| {
            matches!(
                v.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            )
        })
    }
}
