//! # Routes
//!
//! A [`RouteDef`] describes a rule: URI template, method set, content
//! constraints and dispatch target. Registering it with the router compiles it
//! into a [`Route`], which owns the anchored regex used by `matches` and the
//! token list used by `build`.

use crate::config::RouterConfig;
use crate::context::PathParams;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterRegistry};
use crate::negotiate::{BodyFormat, Negotiator};
use crate::pattern::{Pattern, PlaceholderSyntax};
use crate::router::Method;
use regex::Regex;
use serde::Deserialize;
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use tracing::{debug, trace};

/// Action used when a controller target names none
pub const DEFAULT_ACTION: &str = "handle_default";
/// Loader used when a view target names none
pub const DEFAULT_VIEW_LOADER: &str = "views";

/// What a matched route dispatches to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Call `action` on the named controller
    Controller {
        /// Controller name
        name: String,
        /// Action name
        #[serde(default = "default_action")]
        action: String,
    },
    /// Render a view through a named loader
    View {
        /// Loader name
        #[serde(default = "default_loader")]
        loader: String,
        /// View name
        view: String,
        /// HTTP status override
        #[serde(default)]
        status: Option<u16>,
    },
    /// Redirect elsewhere
    Redirect {
        /// URI, or route name when `is_route` is set
        to: String,
        /// Treat `to` as a named route and rebuild it with the path params
        #[serde(default)]
        is_route: bool,
    },
}

fn default_action() -> String {
    DEFAULT_ACTION.to_string()
}

fn default_loader() -> String {
    DEFAULT_VIEW_LOADER.to_string()
}

fn default_methods() -> Vec<Method> {
    vec![Method::Get, Method::Post]
}

/// Uncompiled route definition
///
/// Built in code with the chaining methods, or deserialized from a route
/// table. Without a target it cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteDef {
    /// URI template
    pub uri: String,
    /// Name for reverse lookup
    #[serde(default)]
    pub name: Option<String>,
    /// Accepted methods
    #[serde(default = "default_methods")]
    pub methods: Vec<Method>,
    /// Restrict the parameter source to the method's own store
    #[serde(default)]
    pub strict: bool,
    /// Required request `Content-Type`
    #[serde(default)]
    pub content_type: Option<String>,
    /// Required entry in the `Accept` header
    #[serde(default)]
    pub accepts: Option<String>,
    /// Required request body format
    #[serde(default)]
    pub body_format: Option<BodyFormat>,
    /// Required acceptable response format
    #[serde(default)]
    pub want: Option<BodyFormat>,
    /// Per-placeholder filters
    #[serde(default)]
    pub filters: HashMap<String, Filter>,
    /// Placeholder syntax, router-wide default when absent
    #[serde(default)]
    pub placeholder_syntax: Option<PlaceholderSyntax>,
    /// Dispatch target
    #[serde(default)]
    pub target: Option<Target>,
}

impl RouteDef {
    /// Start a definition for `uri` accepting GET and POST
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
            methods: default_methods(),
            strict: false,
            content_type: None,
            accepts: None,
            body_format: None,
            want: None,
            filters: HashMap::new(),
            placeholder_syntax: None,
            target: None,
        }
    }

    /// Set the route name
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replace the method set
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Mark the route strict
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Require a request `Content-Type`
    #[must_use]
    pub fn content_type(mut self, mime: impl Into<String>) -> Self {
        self.content_type = Some(mime.into());
        self
    }

    /// Require an `Accept` entry
    #[must_use]
    pub fn accepts(mut self, mime: impl Into<String>) -> Self {
        self.accepts = Some(mime.into());
        self
    }

    /// Require a JSON or XML request body
    #[must_use]
    pub const fn body_format(mut self, format: BodyFormat) -> Self {
        self.body_format = Some(format);
        self
    }

    /// Require the client to accept JSON or XML
    #[must_use]
    pub const fn want(mut self, format: BodyFormat) -> Self {
        self.want = Some(format);
        self
    }

    /// Attach a filter to a placeholder
    #[must_use]
    pub fn filter(mut self, placeholder: impl Into<String>, filter: Filter) -> Self {
        self.filters.insert(placeholder.into(), filter);
        self
    }

    /// Override the placeholder syntax
    #[must_use]
    pub const fn syntax(mut self, syntax: PlaceholderSyntax) -> Self {
        self.placeholder_syntax = Some(syntax);
        self
    }

    /// Dispatch to the controller's default action
    #[must_use]
    pub fn controller(self, name: impl Into<String>) -> Self {
        self.controller_action(name, DEFAULT_ACTION)
    }

    /// Dispatch to a controller action
    #[must_use]
    pub fn controller_action(mut self, name: impl Into<String>, action: impl Into<String>) -> Self {
        self.target = Some(Target::Controller {
            name: name.into(),
            action: action.into(),
        });
        self
    }

    /// Render a view through the default loader
    #[must_use]
    pub fn view(self, view: impl Into<String>) -> Self {
        self.view_with(DEFAULT_VIEW_LOADER, view, None)
    }

    /// Render a view through a named loader, optionally overriding the status
    #[must_use]
    pub fn view_with(mut self, loader: impl Into<String>, view: impl Into<String>, status: Option<u16>) -> Self {
        self.target = Some(Target::View {
            loader: loader.into(),
            view: view.into(),
            status,
        });
        self
    }

    /// Redirect to a URI, or to a named route when `is_route` is set
    #[must_use]
    pub fn redirect(mut self, to: impl Into<String>, is_route: bool) -> Self {
        self.target = Some(Target::Redirect {
            to: to.into(),
            is_route,
        });
        self
    }

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.uri.clone())
    }
}

/// Options for reverse building
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Fail on unresolved placeholders instead of returning `None`
    pub strict: bool,
    /// Prepend the base URI (route-level build)
    pub full_uri: bool,
    /// Skip the base URI (router-level build)
    pub short: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            strict: true,
            full_uri: false,
            short: false,
        }
    }
}

impl BuildOptions {
    /// Unresolved placeholders yield `None`
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    /// Set `full_uri`
    #[must_use]
    pub const fn with_full_uri(mut self) -> Self {
        self.full_uri = true;
        self
    }

    /// Set `short`
    #[must_use]
    pub const fn with_short(mut self) -> Self {
        self.short = true;
        self
    }
}

/// Values available to `build`, looked up by placeholder name
pub trait BuildParams {
    /// Value for `name`, if supplied
    fn param(&self, name: &str) -> Option<&str>;
}

impl<K, V, S> BuildParams for HashMap<K, V, S>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
    S: BuildHasher,
{
    fn param(&self, name: &str) -> Option<&str> {
        self.get(name).map(AsRef::as_ref)
    }
}

impl<K, V> BuildParams for BTreeMap<K, V>
where
    K: Borrow<str> + Ord,
    V: AsRef<str>,
{
    fn param(&self, name: &str) -> Option<&str> {
        self.get(name).map(AsRef::as_ref)
    }
}

impl<K: AsRef<str>, V: AsRef<str>> BuildParams for [(K, V)] {
    fn param(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_ref())
    }
}

impl<K: AsRef<str>, V: AsRef<str>, const N: usize> BuildParams for [(K, V); N] {
    fn param(&self, name: &str) -> Option<&str> {
        self.as_slice().param(name)
    }
}

impl BuildParams for PathParams {
    fn param(&self, name: &str) -> Option<&str> {
        self.get(name)
    }
}

/// A compiled, routable rule
#[derive(Debug, Clone)]
pub struct Route {
    name: Option<String>,
    methods: Vec<Method>,
    strict: bool,
    content_type: Option<String>,
    accepts: Option<String>,
    body_format: Option<BodyFormat>,
    want: Option<BodyFormat>,
    target: Target,
    syntax: PlaceholderSyntax,
    pattern: Pattern,
    matcher: Regex,
    value_checks: Vec<(String, Regex)>,
    base_uri: String,
}

impl Route {
    /// Compile a definition against router-wide settings
    ///
    /// Explicit per-route filters win over `{name:filter}` inline filters,
    /// which win over the default filter.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRouteDefinition` when the target or method set is
    /// missing, and `Error::InvalidRoutePattern` for template, filter or regex
    /// problems.
    pub fn compile(def: RouteDef, config: &RouterConfig, filters: &FilterRegistry) -> Result<Self> {
        let Some(target) = def.target.clone() else {
            return Err(Error::InvalidRouteDefinition {
                route: def.label(),
                reason: "no controller, view or redirect target".to_string(),
            });
        };
        if def.methods.is_empty() {
            return Err(Error::InvalidRouteDefinition {
                route: def.label(),
                reason: "empty method set".to_string(),
            });
        }

        let syntax = def.placeholder_syntax.unwrap_or(config.placeholder_syntax);
        let pattern = Pattern::parse(&def.uri, syntax)?;

        let mut fragments = Vec::new();
        let source = pattern.regex_source(&config.base_uri, |name, inline| {
            let chosen = def.filters.get(name).or(inline);
            let fragment = filters
                .resolve(chosen)
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidRoutePattern {
                    pattern: def.uri.clone(),
                    reason: format!("unknown filter for placeholder '{name}'"),
                })?;
            fragments.push((name.to_string(), fragment.clone()));
            Ok(fragment)
        })?;
        let invalid_pattern = |e: regex::Error| Error::InvalidRoutePattern {
            pattern: def.uri.clone(),
            reason: e.to_string(),
        };
        let matcher = Regex::new(&source).map_err(invalid_pattern)?;
        let value_checks = fragments
            .into_iter()
            .map(|(name, fragment)| {
                Regex::new(&format!("(?i)^(?:{fragment})$"))
                    .map(|check| (name, check))
                    .map_err(invalid_pattern)
            })
            .collect::<Result<Vec<_>>>()?;
        trace!(target: "waypost::init", uri = %def.uri, regex = %source, "Compiled route");

        let mut methods: Vec<Method> = Vec::with_capacity(def.methods.len());
        for method in def.methods {
            if !methods.contains(&method) {
                methods.push(method);
            }
        }

        Ok(Self {
            name: def.name,
            methods,
            strict: def.strict,
            content_type: def.content_type,
            accepts: def.accepts,
            body_format: def.body_format,
            want: def.want,
            target,
            syntax,
            pattern,
            matcher,
            value_checks,
            base_uri: config.base_uri.clone(),
        })
    }

    /// Route name
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// URI template as written
    #[must_use]
    pub fn uri(&self) -> &str {
        self.pattern.source()
    }

    /// Parsed template
    #[must_use]
    pub const fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Placeholder syntax the template was parsed with
    #[must_use]
    pub const fn syntax(&self) -> PlaceholderSyntax {
        self.syntax
    }

    /// Accepted methods
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Whether the parameter source is method-restricted
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Dispatch target
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    fn label(&self) -> &str {
        self.name().unwrap_or_else(|| self.uri())
    }

    /// Test the request against this route
    ///
    /// Checks run in a fixed order: method, body format, wanted format,
    /// content type, accept, then the URI. Returns the placeholder values in
    /// template order on success.
    #[must_use]
    pub fn matches(&self, uri: &str, method: Method, negotiator: &Negotiator) -> Option<PathParams> {
        let route = self.label();
        debug!(target: "waypost::matching", route, uri, %method, "Trying route");

        if !self.methods.contains(&method) {
            return None;
        }
        if self.body_format.is_some_and(|f| !negotiator.is_format(f)) {
            return None;
        }
        if self.want.is_some_and(|f| !negotiator.accepts_format(f)) {
            return None;
        }
        trace!(target: "waypost::matching", route, "is/want tests matched");

        if let Some(ct) = &self.content_type {
            if !negotiator.is_content_type(ct, true) {
                return None;
            }
        }
        if let Some(accept) = &self.accepts {
            if !negotiator.accepts(accept) {
                return None;
            }
        }
        trace!(target: "waypost::matching", route, "content negotiation matched");

        let captures = self.matcher.captures(uri)?;
        let params: PathParams = self
            .pattern
            .placeholders()
            .enumerate()
            .filter_map(|(i, name)| {
                captures
                    .name(&format!("p{i}"))
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();

        debug!(target: "waypost::matching", route, params = ?params, "Route matched");
        Some(params)
    }

    /// Regenerate a URI from placeholder values
    ///
    /// Every value must satisfy its placeholder's filter, so the result always
    /// matches this route again. Returns `Ok(None)` when placeholders are
    /// unresolved or rejected and `strict` is off.
    ///
    /// # Errors
    ///
    /// With `strict` on, returns `Error::BuildMissingParameter` naming every
    /// unresolved placeholder, or `Error::BuildInvalidParameter` naming every
    /// value its filter rejects.
    pub fn build<P: BuildParams + ?Sized>(&self, params: &P, opts: BuildOptions) -> Result<Option<String>> {
        let uri = match self.pattern.fill(|name| params.param(name)) {
            Ok(uri) => uri,
            Err(missing) if opts.strict => {
                return Err(Error::BuildMissingParameter {
                    route: self.uri().to_string(),
                    missing,
                });
            }
            Err(missing) => {
                debug!(target: "waypost::building", route = self.label(), ?missing, "Unresolved placeholders");
                return Ok(None);
            }
        };

        let invalid: Vec<String> = self
            .value_checks
            .iter()
            .filter(|(name, check)| params.param(name).is_some_and(|v| !check.is_match(v)))
            .map(|(name, _)| name.clone())
            .collect();
        if !invalid.is_empty() {
            if opts.strict {
                return Err(Error::BuildInvalidParameter {
                    route: self.uri().to_string(),
                    invalid,
                });
            }
            debug!(target: "waypost::building", route = self.label(), ?invalid, "Values rejected by filters");
            return Ok(None);
        }

        if opts.full_uri {
            Ok(Some(format!("{}{uri}", self.base_uri)))
        } else {
            Ok(Some(uri))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(def: RouteDef) -> Route {
        Route::compile(def, &RouterConfig::default(), &FilterRegistry::default()).unwrap()
    }

    fn plain() -> Negotiator {
        Negotiator::new(None, None)
    }

    #[test]
    fn test_simple_match() {
        let route = compile(RouteDef::new("/users/:id").controller("users"));
        let params = route.matches("/users/42", Method::Get, &plain()).unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert!(route.matches("/users/42/edit", Method::Get, &plain()).is_none());
    }

    #[test]
    fn test_method_mismatch() {
        let route = compile(RouteDef::new("/users/:id").methods([Method::Post]).controller("users"));
        assert!(route.matches("/users/42", Method::Get, &plain()).is_none());
        assert!(route.matches("/users/42", Method::Post, &plain()).is_some());
    }

    #[test]
    fn test_case_insensitive_and_trailing_slash() {
        let route = compile(RouteDef::new("/About/").view("about"));
        assert!(route.matches("/about", Method::Get, &plain()).is_some());
        assert!(route.matches("/ABOUT/", Method::Get, &plain()).is_some());
        assert!(route.matches("/about/us", Method::Get, &plain()).is_none());
    }

    #[test]
    fn test_params_in_template_order() {
        let route = compile(
            RouteDef::new("/:year/:slug")
                .filter("year", Filter::named("int"))
                .controller("posts"),
        );
        let params = route.matches("/2024/hello-world", Method::Get, &plain()).unwrap();
        let names: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["year", "slug"]);
        assert!(route.matches("/abc/hello", Method::Get, &plain()).is_none());
    }

    #[test]
    fn test_filter_with_inner_groups() {
        let route = compile(
            RouteDef::new("/files/:kind/:name")
                .filter("kind", Filter::pattern("(img|doc)s?"))
                .controller("files"),
        );
        let params = route.matches("/files/imgs/cat.png", Method::Get, &plain()).unwrap();
        assert_eq!(params.get("kind"), Some("imgs"));
        assert_eq!(params.get("name"), Some("cat.png"));
    }

    #[test]
    fn test_content_constraints() {
        let route = compile(
            RouteDef::new("/api/items")
                .body_format(BodyFormat::Json)
                .accepts("application/json")
                .controller("items"),
        );
        let json = Negotiator::new(Some("application/json; charset=utf-8"), Some("application/json"));
        assert!(route.matches("/api/items", Method::Post, &json).is_some());

        let form = Negotiator::new(Some("application/x-www-form-urlencoded"), Some("application/json"));
        assert!(route.matches("/api/items", Method::Post, &form).is_none());

        let html = Negotiator::new(Some("application/json"), Some("text/html"));
        assert!(route.matches("/api/items", Method::Post, &html).is_none());
    }

    #[test]
    fn test_content_type_case_insensitive() {
        let route = compile(RouteDef::new("/feed").content_type("Application/Atom+XML").view("feed"));
        let n = Negotiator::new(Some("application/atom+xml"), None);
        assert!(route.matches("/feed", Method::Post, &n).is_some());
    }

    #[test]
    fn test_want_xml_respects_html_exclusion() {
        let route = compile(RouteDef::new("/data").want(BodyFormat::Xml).view("data"));
        let browser = Negotiator::new(None, Some("text/html, application/xml;q=0.9"));
        assert!(route.matches("/data", Method::Get, &browser).is_none());
        let client = Negotiator::new(None, Some("application/xml"));
        assert!(route.matches("/data", Method::Get, &client).is_some());
    }

    #[test]
    fn test_build_and_missing() {
        let route = compile(RouteDef::new("/users/:id").controller("users"));
        assert_eq!(route.build(&[("id", "42")], BuildOptions::default()).unwrap().as_deref(), Some("/users/42"));

        let empty: [(&str, &str); 0] = [];
        let err = route.build(&empty, BuildOptions::default()).unwrap_err();
        assert!(matches!(err, Error::BuildMissingParameter { ref missing, .. } if missing == &["id"]));
        assert_eq!(route.build(&empty, BuildOptions::lenient()).unwrap(), None);
    }

    #[test]
    fn test_build_full_uri() {
        let config = RouterConfig::default().with_base_uri("/app/");
        let route = Route::compile(
            RouteDef::new("/users/:id").controller("users"),
            &config,
            &FilterRegistry::default(),
        )
        .unwrap();
        let params = HashMap::from([("id".to_string(), "7".to_string())]);
        let uri = route.build(&params, BuildOptions::default().with_full_uri()).unwrap();
        assert_eq!(uri.as_deref(), Some("/app/users/7"));
        assert!(route.matches("/app/users/7", Method::Get, &plain()).is_some());
        assert!(route.matches("/users/7", Method::Get, &plain()).is_none());
    }

    #[test]
    fn test_round_trip() {
        let route = compile(RouteDef::new("/shop/:category/item-:sku/:variant").controller("shop"));
        let params = [("category", "tools"), ("sku", "A-100"), ("variant", "blue.v2")];
        let uri = route.build(&params, BuildOptions::default()).unwrap().unwrap();
        let matched = route.matches(&uri, Method::Get, &plain()).unwrap();
        for (k, v) in params {
            assert_eq!(matched.get(k), Some(v));
        }
    }

    #[test]
    fn test_build_rejects_values_filters_refuse() {
        let route = compile(
            RouteDef::new("/users/:id/:page")
                .filter("page", Filter::named("int"))
                .controller("users"),
        );

        let err = route
            .build(&[("id", "a/b"), ("page", "two")], BuildOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::BuildInvalidParameter { ref invalid, .. } if invalid == &["id", "page"]));
        assert_eq!(
            route.build(&[("id", "a/b"), ("page", "2")], BuildOptions::lenient()).unwrap(),
            None
        );

        let uri = route.build(&[("id", "ann"), ("page", "2")], BuildOptions::default()).unwrap().unwrap();
        assert!(route.matches(&uri, Method::Get, &plain()).is_some());
    }

    #[test]
    fn test_missing_target_rejected() {
        let err = Route::compile(RouteDef::new("/x"), &RouterConfig::default(), &FilterRegistry::default());
        assert!(matches!(err, Err(Error::InvalidRouteDefinition { .. })));
    }

    #[test]
    fn test_unknown_filter_rejected() {
        let def = RouteDef::new("/x/:id").filter("id", Filter::named("uuidish")).controller("x");
        let err = Route::compile(def, &RouterConfig::default(), &FilterRegistry::default());
        assert!(matches!(err, Err(Error::InvalidRoutePattern { .. })));
    }

    #[test]
    fn test_bad_regex_rejected() {
        let def = RouteDef::new("/x/:id").filter("id", Filter::pattern("([a-z")).controller("x");
        let err = Route::compile(def, &RouterConfig::default(), &FilterRegistry::default());
        assert!(matches!(err, Err(Error::InvalidRoutePattern { .. })));
    }

    #[test]
    fn test_brace_syntax_route() {
        let route = compile(
            RouteDef::new("/orders/{id:int}")
                .syntax(PlaceholderSyntax::Brace)
                .controller("orders"),
        );
        assert_eq!(route.matches("/orders/12", Method::Get, &plain()).unwrap().get("id"), Some("12"));
        assert!(route.matches("/orders/ab", Method::Get, &plain()).is_none());
        assert_eq!(
            route.build(&[("id", "9")], BuildOptions::default()).unwrap().as_deref(),
            Some("/orders/9")
        );
    }

    #[test]
    fn test_deserialize_def() {
        let def: RouteDef = serde_json::from_str(
            r#"{
                "uri": "/users/:id",
                "name": "user",
                "methods": ["get", "PUT"],
                "filters": {"id": {"named": "int"}},
                "target": {"controller": {"name": "users"}}
            }"#,
        )
        .unwrap();
        assert_eq!(def.methods, vec![Method::Get, Method::Put]);
        assert_eq!(
            def.target,
            Some(Target::Controller {
                name: "users".to_string(),
                action: DEFAULT_ACTION.to_string(),
            })
        );
    }
}
