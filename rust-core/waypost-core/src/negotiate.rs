//! # Content Negotiation
//!
//! Parses the request `Content-Type` and `Accept` headers into comparable,
//! weighted forms. Malformed input never errors; it simply fails to match.

use std::collections::BTreeMap;

/// `application/json`
pub const JSON_TYPE: &str = "application/json";
/// `application/xml`
pub const XML_TYPE: &str = "application/xml";
/// `text/html`
pub const HTML_TYPE: &str = "text/html";

/// Request body formats a route can insist on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    /// `application/json`
    Json,
    /// `application/xml`
    Xml,
}

impl BodyFormat {
    /// The MIME type for this format
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Json => JSON_TYPE,
            Self::Xml => XML_TYPE,
        }
    }
}

/// Parsed `Content-Type` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lower-cased MIME type
    pub mime: String,
    /// `;key=value` parameters, keys lower-cased, values unquoted
    pub params: BTreeMap<String, String>,
}

/// Header-driven negotiation for a single request
#[derive(Debug, Clone, Default)]
pub struct Negotiator {
    content_type: Option<String>,
    accept: Option<String>,
    exclude_xml_when_html: bool,
}

impl Negotiator {
    /// Create a negotiator from raw header values
    #[must_use]
    pub fn new(content_type: Option<&str>, accept: Option<&str>) -> Self {
        Self {
            content_type: content_type.map(str::to_string),
            accept: accept.map(str::to_string),
            exclude_xml_when_html: true,
        }
    }

    /// Set the default used by [`Negotiator::accepts_xml`]
    #[must_use]
    pub const fn with_xml_exclusion(mut self, exclude_when_html: bool) -> Self {
        self.exclude_xml_when_html = exclude_when_html;
        self
    }

    /// Lower-cased MIME type of the request body, parameters stripped
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        let raw = self.content_type.as_deref()?;
        let mime = raw.split(';').next().unwrap_or_default().trim();
        if mime.is_empty() {
            return None;
        }
        Some(mime.to_ascii_lowercase())
    }

    /// MIME type plus its parameters
    #[must_use]
    pub fn content_type_with_params(&self) -> Option<ContentType> {
        let raw = self.content_type.as_deref()?;
        let mime = self.content_type()?;
        let params = raw
            .split(';')
            .skip(1)
            .filter_map(|opt| {
                let (key, value) = opt.split_once('=')?;
                let key = key.trim().to_ascii_lowercase();
                if key.is_empty() {
                    return None;
                }
                let value = value.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\0');
                Some((key, value.to_string()))
            })
            .collect();
        Some(ContentType { mime, params })
    }

    /// Compare the request MIME type with `want`
    ///
    /// With `force_lowercase` the wanted type is lower-cased first; otherwise it
    /// must already be lower-case to match.
    #[must_use]
    pub fn is_content_type(&self, want: &str, force_lowercase: bool) -> bool {
        let Some(have) = self.content_type() else {
            return false;
        };
        if force_lowercase {
            want.to_ascii_lowercase() == have
        } else {
            want == have
        }
    }

    /// Request body is JSON
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.is_content_type(JSON_TYPE, false)
    }

    /// Request body is XML
    #[must_use]
    pub fn is_xml(&self) -> bool {
        self.is_content_type(XML_TYPE, false)
    }

    /// Request body is HTML
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.is_content_type(HTML_TYPE, false)
    }

    /// Request body is in the given format
    #[must_use]
    pub fn is_format(&self, format: BodyFormat) -> bool {
        self.is_content_type(format.mime(), false)
    }

    /// Raw `Accept` header, lower-cased
    #[must_use]
    pub fn accept(&self) -> Option<String> {
        self.accept.as_deref().map(str::to_ascii_lowercase)
    }

    /// Weighted `Accept` entries, highest weight first
    ///
    /// Entries without `q=` weigh 1. Equal weights keep header order.
    /// Returns `None` when the header is absent.
    #[must_use]
    pub fn accept_list(&self) -> Option<Vec<(String, f32)>> {
        let raw = self.accept.as_deref()?;
        let mut entries: Vec<(String, f32)> = Vec::new();

        for item in raw.split(',') {
            let mut parts = item.split(';');
            let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
            if mime.is_empty() {
                continue;
            }
            let mut weight = 1.0_f32;
            for param in parts {
                if let Some((key, value)) = param.split_once('=') {
                    if key.trim().eq_ignore_ascii_case("q") {
                        weight = value.trim().parse().unwrap_or(0.0);
                    }
                }
            }
            match entries.iter_mut().find(|(m, _)| *m == mime) {
                Some(existing) => existing.1 = weight,
                None => entries.push((mime, weight)),
            }
        }

        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        Some(entries)
    }

    /// Whether `mime` is accepted with a nonzero weight
    #[must_use]
    pub fn accepts(&self, mime: &str) -> bool {
        let mime = mime.to_ascii_lowercase();
        self.accept_list()
            .is_some_and(|list| list.iter().any(|(m, q)| *m == mime && *q > 0.0))
    }

    /// First type from `candidates`, in the caller's order, that is accepted
    #[must_use]
    pub fn accepts_any<S: AsRef<str>>(&self, candidates: &[S]) -> Option<String> {
        let list = self.accept_list()?;
        candidates.iter().find_map(|want| {
            let want = want.as_ref().to_ascii_lowercase();
            list.iter()
                .any(|(m, q)| *m == want && *q > 0.0)
                .then_some(want)
        })
    }

    /// Client accepts JSON
    #[must_use]
    pub fn accepts_json(&self) -> bool {
        self.accepts(JSON_TYPE)
    }

    /// Client accepts HTML
    #[must_use]
    pub fn accepts_html(&self) -> bool {
        self.accepts(HTML_TYPE)
    }

    /// Client accepts XML, using the configured HTML exclusion
    #[must_use]
    pub fn accepts_xml(&self) -> bool {
        self.accepts_xml_with(self.exclude_xml_when_html)
    }

    /// Client accepts XML
    ///
    /// Browsers list `application/xml` in their default `Accept`, so when
    /// `exclude_if_html` is set an HTML-accepting client never counts.
    #[must_use]
    pub fn accepts_xml_with(&self, exclude_if_html: bool) -> bool {
        if exclude_if_html && self.accepts_html() {
            return false;
        }
        self.accepts(XML_TYPE)
    }

    /// Client accepts the given body format
    #[must_use]
    pub fn accepts_format(&self, format: BodyFormat) -> bool {
        match format {
            BodyFormat::Json => self.accepts_json(),
            BodyFormat::Xml => self.accepts_xml(),
        }
    }
}
