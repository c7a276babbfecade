//! # Route Context
//!
//! The merged, read-only view of a matched request handed to controllers,
//! view loaders and redirects. A context belongs to one request; the router
//! never keeps it.
//!
//! Key lookup precedence: path params, then body params, then request params,
//! then uploaded files.

use crate::multipart::UploadedFile;
use crate::negotiate::Negotiator;
use crate::route::Route;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Placeholder values in template order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    /// Value of a placeholder
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `(name, value)` pairs in template order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of captured placeholders
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No placeholders were captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A value found by [`RouteContext::get`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContextValue<'a> {
    /// Path or request parameter
    Text(&'a str),
    /// JSON body parameter
    Json(&'a Value),
    /// Uploaded file
    File(&'a UploadedFile),
}

impl<'a> ContextValue<'a> {
    /// The value as text, if it is a string
    #[must_use]
    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            Self::Text(s) => Some(s),
            Self::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// Everything the router gathered for a matched request
#[derive(Debug)]
pub(crate) struct ContextParts {
    pub route: Arc<Route>,
    pub method: String,
    pub uri: String,
    pub path_params: PathParams,
    pub body_params: Map<String, Value>,
    pub body_text: Option<String>,
    pub request_params: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
    pub negotiator: Negotiator,
}

/// Immutable view of a matched request
#[derive(Debug, Clone)]
pub struct RouteContext {
    route: Arc<Route>,
    method: String,
    uri: String,
    path_segments: Vec<String>,
    path_params: PathParams,
    body_params: Map<String, Value>,
    body_text: Option<String>,
    request_params: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
    negotiator: Negotiator,
    file_lookup: bool,
}

impl RouteContext {
    pub(crate) fn new(parts: ContextParts) -> Self {
        let path_segments = parts
            .uri
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            route: parts.route,
            method: parts.method,
            uri: parts.uri,
            path_segments,
            path_params: parts.path_params,
            body_params: parts.body_params,
            body_text: parts.body_text,
            request_params: parts.request_params,
            files: parts.files,
            negotiator: parts.negotiator,
            file_lookup: true,
        }
    }

    /// Stop `get` and `contains` from falling back to uploaded files
    #[must_use]
    pub fn without_file_lookup(mut self) -> Self {
        self.file_lookup = false;
        self
    }

    /// The matched route
    #[must_use]
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    /// Request method, upper-case
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request URI as matched
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Non-empty `/`-separated URI segments
    #[must_use]
    pub fn path_segments(&self) -> &[String] {
        &self.path_segments
    }

    /// Values captured from the URI
    #[must_use]
    pub const fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    /// Parameters decoded from a JSON body
    #[must_use]
    pub const fn body_params(&self) -> &Map<String, Value> {
        &self.body_params
    }

    /// Raw body text of an XML request
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        self.body_text.as_deref()
    }

    /// Query/form parameters chosen for this route
    #[must_use]
    pub const fn request_params(&self) -> &HashMap<String, String> {
        &self.request_params
    }

    /// Uploaded files
    #[must_use]
    pub const fn files(&self) -> &HashMap<String, UploadedFile> {
        &self.files
    }

    /// A single upload
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    /// Header negotiation for this request
    #[must_use]
    pub const fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    /// Body params, only for JSON requests
    #[must_use]
    pub fn json_body(&self) -> Option<&Map<String, Value>> {
        self.negotiator.is_json().then_some(&self.body_params)
    }

    /// Body text, only for XML requests
    #[must_use]
    pub fn xml_body(&self) -> Option<&str> {
        if self.negotiator.is_xml() {
            self.body_text()
        } else {
            None
        }
    }

    /// Look a key up across every parameter source
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ContextValue<'_>> {
        if let Some(v) = self.path_params.get(key) {
            return Some(ContextValue::Text(v));
        }
        if let Some(v) = self.body_params.get(key) {
            return Some(ContextValue::Json(v));
        }
        if let Some(v) = self.request_params.get(key) {
            return Some(ContextValue::Text(v));
        }
        if self.file_lookup {
            return self.files.get(key).map(ContextValue::File);
        }
        None
    }

    /// Whether `get` would find the key
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Flatten into a single JSON map
    ///
    /// Earlier sources win on key collisions. Files are only included when
    /// asked for.
    #[must_use]
    pub fn to_mapping(&self, include_files: bool) -> Map<String, Value> {
        let mut out = Map::new();
        if include_files {
            for (k, file) in &self.files {
                if let Ok(v) = serde_json::to_value(file) {
                    out.insert(k.clone(), v);
                }
            }
        }
        for (k, v) in &self.request_params {
            out.insert(k.clone(), Value::String(v.clone()));
        }
        for (k, v) in &self.body_params {
            out.insert(k.clone(), v.clone());
        }
        for (k, v) in self.path_params.iter() {
            out.insert(k.to_string(), Value::String(v.to_string()));
        }
        out
    }
}
