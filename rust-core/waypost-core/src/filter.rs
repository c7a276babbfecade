//! # Placeholder Filters
//!
//! Named regex fragments that constrain what a route placeholder may capture.
//!
//! A filter is only ever a fragment: the pattern compiler wraps each one in its
//! own capture group, so fragments may contain alternation or inner groups
//! without shifting placeholder positions.

use serde::Deserialize;
use std::collections::HashMap;

/// Fragment used for placeholders without an explicit filter
pub const DEFAULT_FILTER: &str = r"[\w\-\~\.]+";

/// Filter attached to a single placeholder
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Look the fragment up in the [`FilterRegistry`] by name
    Named(String),
    /// Use this regex fragment verbatim
    Pattern(String),
}

impl Filter {
    /// Shorthand for [`Filter::Named`]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Shorthand for [`Filter::Pattern`]
    pub fn pattern(fragment: impl Into<String>) -> Self {
        Self::Pattern(fragment.into())
    }
}

/// Registry of named filter fragments plus the default filter
#[derive(Debug, Clone)]
pub struct FilterRegistry {
    default: String,
    named: HashMap<String, String>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER)
    }
}

impl FilterRegistry {
    /// Create a registry with the built-in filters and the given default
    ///
    /// Built-ins: `int`, `alpha`, `alnum`, `slug`, `segment`, `path`.
    #[must_use]
    pub fn new(default: impl Into<String>) -> Self {
        let named = [
            ("int", r"\d+"),
            ("alpha", r"[A-Za-z]+"),
            ("alnum", r"[A-Za-z0-9]+"),
            ("slug", r"[\w\-]+"),
            ("segment", r"[^/]+"),
            ("path", r".+"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            default: default.into(),
            named,
        }
    }

    /// Register or replace a named filter
    pub fn insert(&mut self, name: impl Into<String>, fragment: impl Into<String>) {
        self.named.insert(name.into(), fragment.into());
    }

    /// The fragment applied to unfiltered placeholders
    #[must_use]
    pub fn default_fragment(&self) -> &str {
        &self.default
    }

    /// Look up a named fragment
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Resolve an optional filter to its regex fragment
    ///
    /// Returns `None` only when a named filter is unknown.
    #[must_use]
    pub fn resolve<'a>(&'a self, filter: Option<&'a Filter>) -> Option<&'a str> {
        match filter {
            None => Some(&self.default),
            Some(Filter::Pattern(fragment)) => Some(fragment),
            Some(Filter::Named(name)) => self.get(name),
        }
    }
}
