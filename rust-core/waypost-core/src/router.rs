//! # Router
//!
//! Ordered, first-match-wins routing with reverse URI building.
//!
//! ## Features
//!
//! - Routes tried in registration order, never reordered
//! - Method, content-type, accept and body-format constraints per route
//! - Named routes for reverse building (first registration of a name wins)
//! - Optional default route when nothing else matches
//! - Per-request [`RouteContext`] assembly; the router keeps no request state
//!
//! The registry is built once and then shared read-only across requests.

use crate::config::RouterConfig;
use crate::context::{ContextParts, PathParams, RouteContext};
use crate::dispatch::{Dispatcher, Redirector};
use crate::error::{Error, Result};
use crate::filter::FilterRegistry;
use crate::form::parse_urlencoded_bytes;
use crate::json::parse_body_params;
use crate::multipart::{parse_multipart, UploadedFile};
use crate::request::{Request, FORM_URLENCODED, MULTIPART_FORM};
use crate::route::{BuildOptions, BuildParams, Route, RouteDef, Target, DEFAULT_VIEW_LOADER};
use serde::Deserialize;
use serde_json::Map;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP HEAD
    Head,
    /// HTTP PATCH
    Patch,
    /// POKE, an application-defined method
    Poke,
    /// HTTP OPTIONS
    Options,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Head => write!(f, "HEAD"),
            Self::Patch => write!(f, "PATCH"),
            Self::Poke => write!(f, "POKE"),
            Self::Options => write!(f, "OPTIONS"),
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "PATCH" => Ok(Self::Patch),
            "POKE" => Ok(Self::Poke),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(Error::UnsupportedMethod {
                method: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Options for [`Router::redirect`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedirectOptions {
    /// Do not prefix the destination with the base URI
    pub short: bool,
    /// Also make this the default route
    pub default: bool,
    /// The destination is a route name
    pub route: bool,
}

/// A whole routing setup, loadable from JSON
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RouteTable {
    /// Router settings
    pub config: RouterConfig,
    /// Routes in priority order
    pub routes: Vec<RouteDef>,
    /// Fallback route, not part of the ordered list
    pub default: Option<RouteDef>,
}

impl RouteTable {
    /// Load a table from JSON
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the document does not deserialize.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut table: Self = serde_json::from_str(json)?;
        table.config = table.config.normalized();
        Ok(table)
    }
}

/// Ordered route registry
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Arc<Route>>,
    named: HashMap<String, Arc<Route>>,
    names: Vec<String>,
    default: Option<Arc<Route>>,
    config: RouterConfig,
    filters: FilterRegistry,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

impl Router {
    /// Create an empty router
    #[must_use]
    pub fn new(config: RouterConfig) -> Self {
        let config = config.normalized();
        let mut filters = FilterRegistry::new(config.default_filter.clone());
        for (name, fragment) in &config.filters {
            filters.insert(name.clone(), fragment.clone());
        }
        Self {
            routes: Vec::new(),
            named: HashMap::new(),
            names: Vec::new(),
            default: None,
            config,
            filters,
        }
    }

    /// Build a router from a route table
    ///
    /// # Errors
    ///
    /// Returns the first route compilation error.
    pub fn from_table(table: RouteTable) -> Result<Self> {
        let mut router = Self::new(table.config);
        for def in table.routes {
            router.add(def)?;
        }
        if let Some(def) = table.default {
            router.set_default(def)?;
        }
        Ok(router)
    }

    fn compile(&mut self, def: RouteDef) -> Result<Arc<Route>> {
        let route = Arc::new(Route::compile(def, &self.config, &self.filters)?);
        debug!(target: "waypost::init", uri = route.uri(), name = ?route.name(), "Registering route");

        if let Some(name) = route.name() {
            if self.named.contains_key(name) {
                debug!(target: "waypost::init", name, "Route name already registered, keeping the first");
            } else {
                self.named.insert(name.to_string(), Arc::clone(&route));
                self.names.push(name.to_string());
            }
        }
        Ok(route)
    }

    /// Append a route
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRouteDefinition` or `Error::InvalidRoutePattern`
    /// when the definition does not compile.
    pub fn add(&mut self, def: RouteDef) -> Result<Arc<Route>> {
        let route = self.compile(def)?;
        self.routes.push(Arc::clone(&route));
        Ok(route)
    }

    /// Append a route and make it the default
    ///
    /// # Errors
    ///
    /// Same as [`Router::add`].
    pub fn add_default(&mut self, def: RouteDef) -> Result<Arc<Route>> {
        let route = self.add(def)?;
        self.default = Some(Arc::clone(&route));
        Ok(route)
    }

    /// Set the default route without adding it to the ordered list
    ///
    /// # Errors
    ///
    /// Same as [`Router::add`].
    pub fn set_default(&mut self, def: RouteDef) -> Result<Arc<Route>> {
        let route = self.compile(def)?;
        self.default = Some(Arc::clone(&route));
        Ok(route)
    }

    /// Add `/<name>/` dispatching to controller `name`, named `name`
    ///
    /// # Errors
    ///
    /// Same as [`Router::add`].
    pub fn controller(&mut self, name: &str) -> Result<Arc<Route>> {
        self.add(RouteDef::new(format!("/{name}/")).name(name).controller(name))
    }

    /// Add a child route of a controller route
    ///
    /// With an action, the URI is the parent URI plus `suburi` and the name is
    /// `<controller>_<action>` without any `handle_` prefix. Without one, the
    /// URI is `<parent>/<suburi>/`, the action `handle_<suburi>` and the name
    /// `<controller>_<suburi>`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRouteDefinition` if the parent does not target a
    /// controller, otherwise the same as [`Router::add`].
    pub fn nest(
        &mut self,
        parent: &Route,
        suburi: &str,
        action: Option<&str>,
        methods: Option<Vec<Method>>,
    ) -> Result<Arc<Route>> {
        let Target::Controller { name: controller, .. } = parent.target() else {
            return Err(Error::InvalidRouteDefinition {
                route: parent.name().unwrap_or_else(|| parent.uri()).to_string(),
                reason: "child routes need a controller parent".to_string(),
            });
        };
        let base = parent.uri().trim_end_matches('/');

        let mut def = match action {
            Some(action) => {
                let short = action.strip_prefix("handle_").unwrap_or(action);
                RouteDef::new(format!("{base}{suburi}"))
                    .name(format!("{controller}_{short}"))
                    .controller_action(controller.clone(), action)
            }
            None => RouteDef::new(format!("{base}/{suburi}/"))
                .name(format!("{controller}_{suburi}"))
                .controller_action(controller.clone(), format!("handle_{suburi}")),
        }
        .syntax(parent.syntax());
        if let Some(methods) = methods {
            def = def.methods(methods);
        }
        self.add(def)
    }

    /// Add a redirect rule
    ///
    /// # Errors
    ///
    /// Same as [`Router::add`].
    pub fn redirect(&mut self, from: &str, to: &str, opts: RedirectOptions) -> Result<Arc<Route>> {
        let target = if opts.short || opts.route {
            to.to_string()
        } else {
            format!("{}{to}", self.config.base_uri)
        };
        let def = RouteDef::new(from).redirect(target, opts.route);
        if opts.default {
            self.add_default(def)
        } else {
            self.add(def)
        }
    }

    /// Add a route that renders a view without a controller
    ///
    /// # Errors
    ///
    /// Same as [`Router::add`].
    pub fn display(&mut self, path: &str, view: &str, loader: Option<&str>, is_default: bool) -> Result<Arc<Route>> {
        let def = RouteDef::new(path).view_with(loader.unwrap_or(DEFAULT_VIEW_LOADER), view, None);
        if is_default {
            self.add_default(def)
        } else {
            self.add(def)
        }
    }

    /// Whether a route is registered under `name`
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    /// Route registered under `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Route>> {
        self.named.get(name)
    }

    /// Routes in match order
    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Registered route names, in registration order
    #[must_use]
    pub fn known_routes(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    /// The default route
    #[must_use]
    pub fn default_route(&self) -> Option<&Arc<Route>> {
        self.default.as_ref()
    }

    /// Router settings
    #[must_use]
    pub const fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Prefix stripped from matched URIs and prepended to built ones
    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.config.base_uri
    }

    /// Match a request by its own path and method
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedJsonBody` when strict JSON bodies are on and the
    /// body of a matched JSON request does not parse.
    pub fn matches(&self, req: &Request) -> Result<Option<RouteContext>> {
        self.match_at(req, None, None)
    }

    /// Match a request, optionally overriding its URI and method
    ///
    /// A query string on `uri` is ignored. A method the router does not know
    /// matches no ordered route but still reaches the default route.
    ///
    /// # Errors
    ///
    /// Same as [`Router::matches`].
    pub fn match_at(&self, req: &Request, uri: Option<&str>, method: Option<&str>) -> Result<Option<RouteContext>> {
        let uri = uri.unwrap_or(&req.path);
        let uri = uri.split_once('?').map_or(uri, |(path, _)| path);
        let method_name = method.map_or_else(|| req.method.to_string(), str::to_ascii_uppercase);
        let parsed = method_name.parse::<Method>().ok();

        let negotiator = req
            .negotiator()
            .with_xml_exclusion(self.config.exclude_xml_when_html);

        if let Some(method) = parsed {
            for route in &self.routes {
                if let Some(params) = route.matches(uri, method, &negotiator) {
                    return self
                        .assemble(req, route, &method_name, parsed, uri, params)
                        .map(Some);
                }
            }
        }

        match &self.default {
            Some(route) => {
                debug!(target: "waypost::matching", uri, method = %method_name, "Falling back to default route");
                self.assemble(req, route, &method_name, parsed, uri, PathParams::default())
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn assemble(
        &self,
        req: &Request,
        route: &Arc<Route>,
        method_name: &str,
        method: Option<Method>,
        uri: &str,
        path_params: PathParams,
    ) -> Result<RouteContext> {
        let negotiator = req
            .negotiator()
            .with_xml_exclusion(self.config.exclude_xml_when_html);
        let is_form = negotiator.is_content_type(FORM_URLENCODED, false);
        let is_multipart = negotiator.is_content_type(MULTIPART_FORM, false);

        let (request_params, files): (HashMap<String, String>, HashMap<String, UploadedFile>) =
            match method {
                Some(Method::Put) if is_form => (parse_urlencoded_bytes(req.body_bytes()), HashMap::new()),
                Some(Method::Put) if is_multipart => {
                    let data = parse_multipart(req.body_bytes(), &self.config.upload_dir);
                    (data.fields, data.files)
                }
                Some(Method::Get) if route.is_strict() => (req.query_map().clone(), HashMap::new()),
                Some(Method::Post) if route.is_strict() => (req.form_map().clone(), req.files().clone()),
                _ => (req.merged_params(), req.files().clone()),
            };

        let body_params = if negotiator.is_json() {
            match parse_body_params(req.body_bytes()) {
                Ok(params) => params,
                Err(e) if self.config.strict_json_body => return Err(e),
                Err(e) => {
                    warn!(error = %e, uri, "Ignoring malformed JSON body");
                    Map::new()
                }
            }
        } else {
            Map::new()
        };

        let body_text = negotiator
            .is_xml()
            .then(|| String::from_utf8_lossy(req.body_bytes()).into_owned());

        Ok(RouteContext::new(ContextParts {
            route: Arc::clone(route),
            method: method_name.to_string(),
            uri: uri.to_string(),
            path_params,
            body_params,
            body_text,
            request_params,
            files,
            negotiator,
        }))
    }

    /// Match a request and dispatch it
    ///
    /// # Errors
    ///
    /// Returns `Error::NoRouteMatched` when neither a route nor a default
    /// matched, plus any error from [`Router::dispatch`].
    pub fn route<R>(&self, req: &Request, dispatcher: &Dispatcher<R>) -> Result<R> {
        let Some(ctx) = self.matches(req)? else {
            return Err(Error::NoRouteMatched {
                method: req.method.to_string(),
                uri: req.path.clone(),
            });
        };
        self.dispatch(&ctx, dispatcher)
    }

    /// Hand a context to its route's target
    ///
    /// # Errors
    ///
    /// Returns `Error::ControllerNotFound`, `Error::ActionNotFound` or
    /// `Error::ViewLoaderNotFound` for targets the dispatcher cannot serve, and
    /// build errors for route-name redirects.
    pub fn dispatch<R>(&self, ctx: &RouteContext, dispatcher: &Dispatcher<R>) -> Result<R> {
        let route = ctx.route();
        if let Some(name) = route.name() {
            info!(target: "waypost::routing", route = name, "Dispatching");
        }

        match route.target() {
            Target::Redirect { to, is_route: true } => {
                debug!(target: "waypost::routing", to, "Redirecting to route");
                self.go(to, ctx.path_params(), BuildOptions::default(), dispatcher.redirector())
            }
            Target::Redirect { to, is_route: false } => {
                debug!(target: "waypost::routing", to, "Redirecting");
                Ok(dispatcher.redirector().redirect(to))
            }
            Target::View { loader, view, status } => {
                debug!(target: "waypost::routing", view, "Loading view");
                let loader = dispatcher
                    .get_loader(loader)
                    .ok_or_else(|| Error::ViewLoaderNotFound { name: loader.clone() })?;
                Ok(loader.load(view, ctx.to_mapping(false), *status))
            }
            Target::Controller { name, action } => {
                debug!(target: "waypost::routing", controller = name, action, "Calling controller");
                let controller = dispatcher
                    .get_controller(name)
                    .ok_or_else(|| Error::ControllerNotFound { name: name.clone() })?;
                controller.init_route(ctx);
                let handler = controller.action(action).ok_or_else(|| Error::ActionNotFound {
                    controller: name.clone(),
                    action: action.clone(),
                })?;
                Ok(handler(ctx))
            }
        }
    }

    /// Build the URI of a named route
    ///
    /// The base URI is prepended unless `opts.short` is set.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownNamedRoute` for unregistered names and
    /// `Error::BuildMissingParameter` for unresolved placeholders in strict mode.
    pub fn build<P: BuildParams + ?Sized>(&self, name: &str, params: &P, opts: BuildOptions) -> Result<Option<String>> {
        debug!(target: "waypost::building", name, "Building route");
        let route = self.named.get(name).ok_or_else(|| Error::UnknownNamedRoute {
            name: name.to_string(),
        })?;

        let opts = BuildOptions {
            full_uri: false,
            ..opts
        };
        let uri = route.build(params, opts)?;
        if opts.short {
            Ok(uri)
        } else {
            Ok(uri.map(|uri| format!("{}{uri}", self.config.base_uri)))
        }
    }

    /// Redirect to a named route
    ///
    /// Building is always strict here.
    ///
    /// # Errors
    ///
    /// Same as [`Router::build`].
    pub fn go<P, R>(&self, name: &str, params: &P, opts: BuildOptions, redirector: &dyn Redirector<R>) -> Result<R>
    where
        P: BuildParams + ?Sized,
    {
        let opts = BuildOptions { strict: true, ..opts };
        match self.build(name, params, opts)? {
            Some(uri) => Ok(redirector.redirect(&uri)),
            None => Err(Error::BuildMissingParameter {
                route: name.to_string(),
                missing: Vec::new(),
            }),
        }
    }
}
