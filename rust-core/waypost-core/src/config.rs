//! # Router Configuration
//!
//! Router-wide settings. Every field has a default, so a config file only
//! needs to name what it changes.

use crate::error::Result;
use crate::filter::DEFAULT_FILTER;
use crate::pattern::PlaceholderSyntax;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Router configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Prefix stripped from incoming URIs and prepended to built ones
    pub base_uri: String,
    /// Filter fragment for placeholders without their own filter
    pub default_filter: String,
    /// Extra named filters, added to the built-in set
    pub filters: HashMap<String, String>,
    /// Placeholder syntax for routes that do not pick one
    pub placeholder_syntax: PlaceholderSyntax,
    /// `accepts_xml` ignores clients that also accept HTML
    pub exclude_xml_when_html: bool,
    /// Malformed JSON bodies fail the match instead of yielding no params
    pub strict_json_body: bool,
    /// Directory for multipart upload temp files
    pub upload_dir: PathBuf,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_uri: String::new(),
            default_filter: DEFAULT_FILTER.to_string(),
            filters: HashMap::new(),
            placeholder_syntax: PlaceholderSyntax::Colon,
            exclude_xml_when_html: true,
            strict_json_body: false,
            upload_dir: std::env::temp_dir(),
        }
    }
}

impl RouterConfig {
    /// Load a configuration from JSON
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the document does not deserialize.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    /// Set the base URI, dropping any trailing `/`
    #[must_use]
    pub fn with_base_uri(mut self, base_uri: &str) -> Self {
        self.base_uri = base_uri.trim_end_matches('/').to_string();
        self
    }

    /// Use the directory of the front script as base URI
    ///
    /// `/app/index.php` gives `/app`; a script at the root gives no prefix.
    #[must_use]
    pub fn with_script_prefix(self, script_name: &str) -> Self {
        let dir = script_name.rsplit_once('/').map_or("", |(dir, _)| dir);
        self.with_base_uri(dir)
    }

    /// Set the placeholder syntax
    #[must_use]
    pub const fn with_syntax(mut self, syntax: PlaceholderSyntax) -> Self {
        self.placeholder_syntax = syntax;
        self
    }

    /// Make malformed JSON bodies a hard error
    #[must_use]
    pub const fn with_strict_json(mut self, strict: bool) -> Self {
        self.strict_json_body = strict;
        self
    }

    /// Store multipart uploads under `dir`
    #[must_use]
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    pub(crate) fn normalized(mut self) -> Self {
        let trimmed = self.base_uri.trim_end_matches('/').len();
        self.base_uri.truncate(trimmed);
        self
    }
}
