//! # Route Pattern Compiler
//!
//! Turns a URI template such as `/users/:id/posts/:post` (or
//! `/users/{id}/posts/{post:int}`) into an ordered list of [`Segment`]s.
//!
//! Matching and building both walk the same token list, so whatever `build`
//! writes into a placeholder position is exactly what `match` reads back out.

use crate::error::{Error, Result};
use crate::filter::Filter;
use serde::Deserialize;
use std::collections::HashSet;

/// Placeholder delimiter style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderSyntax {
    /// `:name`
    #[default]
    Colon,
    /// `{name}` or `{name:filter}`
    Brace,
}

/// One token of a compiled pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text matched literally
    Literal(String),
    /// Named variable segment, with an optional inline named filter
    Placeholder {
        /// Placeholder name
        name: String,
        /// Filter given inline as `{name:filter}`
        filter: Option<Filter>,
    },
}

/// Parsed URI template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn push_literal(segments: &mut Vec<Segment>, c: char) {
    if let Some(Segment::Literal(lit)) = segments.last_mut() {
        lit.push(c);
    } else {
        segments.push(Segment::Literal(c.to_string()));
    }
}

impl Pattern {
    /// Parse a template using the given placeholder syntax
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` for unterminated or empty brace
    /// placeholders and for placeholder names used more than once.
    pub fn parse(source: &str, syntax: PlaceholderSyntax) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidRoutePattern {
            pattern: source.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            let named_next = chars.peek().is_some_and(|&n| is_name_char(n));
            match (syntax, c) {
                (PlaceholderSyntax::Colon, ':') if named_next => {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if !is_name_char(n) {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    segments.push(Segment::Placeholder { name, filter: None });
                }
                (PlaceholderSyntax::Brace, '{') => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        inner.push(n);
                    }
                    if !closed {
                        return Err(invalid("unterminated '{' placeholder".to_string()));
                    }
                    let (name, filter) = match inner.split_once(':') {
                        Some((name, filter)) => (name.trim(), Some(Filter::named(filter.trim()))),
                        None => (inner.trim(), None),
                    };
                    if name.is_empty() || !name.chars().all(is_name_char) {
                        return Err(invalid(format!("bad placeholder name '{{{inner}}}'")));
                    }
                    segments.push(Segment::Placeholder {
                        name: name.to_string(),
                        filter,
                    });
                }
                _ => push_literal(&mut segments, c),
            }
        }

        let mut seen = HashSet::new();
        for segment in &segments {
            if let Segment::Placeholder { name, .. } = segment {
                if !seen.insert(name.as_str()) {
                    return Err(invalid(format!("placeholder '{name}' appears more than once")));
                }
            }
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The template as written
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Tokens in appearance order
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in appearance order
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Build the anchored, case-insensitive regex source for this pattern
    ///
    /// `fragment_for` supplies the filter fragment of each placeholder; the
    /// n-th placeholder becomes capture group `p{n}`. Trailing slashes on the
    /// incoming URI are tolerated. An empty pattern matches anything under
    /// `base_uri`.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `fragment_for`.
    pub fn regex_source<F>(&self, base_uri: &str, mut fragment_for: F) -> Result<String>
    where
        F: FnMut(&str, Option<&Filter>) -> Result<String>,
    {
        let mut out = String::from("(?i)^");
        out.push_str(&regex::escape(base_uri));

        if self.segments.is_empty() {
            out.push_str(".*$");
            return Ok(out);
        }

        let last = self.segments.len() - 1;
        let mut index = 0;
        for (pos, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    let lit = if pos == last { lit.trim_end_matches('/') } else { lit };
                    out.push_str(&regex::escape(lit));
                }
                Segment::Placeholder { name, filter } => {
                    let fragment = fragment_for(name, filter.as_ref())?;
                    out.push_str(&format!("(?P<p{index}>{fragment})"));
                    index += 1;
                }
            }
        }
        out.push_str("/*$");
        Ok(out)
    }

    /// Substitute placeholder values in appearance order
    ///
    /// # Errors
    ///
    /// Returns the names of every placeholder `lookup` could not resolve.
    pub fn fill<'v, F>(&self, mut lookup: F) -> std::result::Result<String, Vec<String>>
    where
        F: FnMut(&str) -> Option<&'v str>,
    {
        let mut uri = String::with_capacity(self.source.len());
        let mut missing = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => uri.push_str(lit),
                Segment::Placeholder { name, .. } => match lookup(name) {
                    Some(value) => uri.push_str(value),
                    None => missing.push(name.clone()),
                },
            }
        }

        if missing.is_empty() {
            Ok(uri)
        } else {
            Err(missing)
        }
    }
}
