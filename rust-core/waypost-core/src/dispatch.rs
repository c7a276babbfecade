//! # Dispatch Collaborators
//!
//! The router hands a matched [`RouteContext`] to one of three kinds of
//! collaborator, chosen by the route's target:
//!
//! - a controller ([`Dispatchable`]) looked up by name, whose action is looked
//!   up by name in turn
//! - a [`ViewLoader`] that renders a view from the context mapping
//! - a [`Redirector`] that turns a URI into a response
//!
//! All three produce the caller's response type `R`; the router never builds
//! responses itself.

use crate::context::RouteContext;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A controller action
pub type Action<R> = Arc<dyn Fn(&RouteContext) -> R + Send + Sync>;

/// Hook run before every action of a controller
pub type InitHook = Arc<dyn Fn(&RouteContext) + Send + Sync>;

/// A controller: a named set of actions
pub trait Dispatchable<R>: Send + Sync {
    /// Called with the context before the action runs
    fn init_route(&self, _ctx: &RouteContext) {}

    /// Look up an action by name
    fn action(&self, name: &str) -> Option<Action<R>>;
}

/// Renders views for view targets
pub trait ViewLoader<R>: Send + Sync {
    /// Render `view` with the flattened context; `status` overrides the HTTP status
    fn load(&self, view: &str, data: Map<String, Value>, status: Option<u16>) -> R;
}

/// Produces redirect responses
pub trait Redirector<R>: Send + Sync {
    /// Redirect the client to `uri`
    fn redirect(&self, uri: &str) -> R;
}

impl<R, F> Redirector<R> for F
where
    F: Fn(&str) -> R + Send + Sync,
{
    fn redirect(&self, uri: &str) -> R {
        self(uri)
    }
}

/// Closure-backed controller
pub struct ActionTable<R> {
    actions: HashMap<String, Action<R>>,
    init: Option<InitHook>,
}

impl<R> Default for ActionTable<R> {
    fn default() -> Self {
        Self {
            actions: HashMap::new(),
            init: None,
        }
    }
}

impl<R> ActionTable<R> {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action
    #[must_use]
    pub fn on<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&RouteContext) -> R + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    /// Register the `init_route` hook
    #[must_use]
    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RouteContext) + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(hook));
        self
    }
}

impl<R> Dispatchable<R> for ActionTable<R> {
    fn init_route(&self, ctx: &RouteContext) {
        if let Some(hook) = &self.init {
            hook(ctx);
        }
    }

    fn action(&self, name: &str) -> Option<Action<R>> {
        self.actions.get(name).cloned()
    }
}

/// Lookup tables for controllers and view loaders, plus the redirector
pub struct Dispatcher<R> {
    controllers: HashMap<String, Arc<dyn Dispatchable<R>>>,
    loaders: HashMap<String, Arc<dyn ViewLoader<R>>>,
    redirector: Arc<dyn Redirector<R>>,
}

impl<R> Clone for Dispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            controllers: self.controllers.clone(),
            loaders: self.loaders.clone(),
            redirector: Arc::clone(&self.redirector),
        }
    }
}

impl<R> Dispatcher<R> {
    /// Create a dispatcher with no controllers or loaders
    pub fn new<D: Redirector<R> + 'static>(redirector: D) -> Self {
        Self {
            controllers: HashMap::new(),
            loaders: HashMap::new(),
            redirector: Arc::new(redirector),
        }
    }

    /// Register a controller under `name`
    #[must_use]
    pub fn controller<C: Dispatchable<R> + 'static>(mut self, name: impl Into<String>, controller: C) -> Self {
        self.controllers.insert(name.into(), Arc::new(controller));
        self
    }

    /// Register a view loader under `name`
    #[must_use]
    pub fn loader<L: ViewLoader<R> + 'static>(mut self, name: impl Into<String>, loader: L) -> Self {
        self.loaders.insert(name.into(), Arc::new(loader));
        self
    }

    /// Controller registered under `name`
    #[must_use]
    pub fn get_controller(&self, name: &str) -> Option<&Arc<dyn Dispatchable<R>>> {
        self.controllers.get(name)
    }

    /// View loader registered under `name`
    #[must_use]
    pub fn get_loader(&self, name: &str) -> Option<&Arc<dyn ViewLoader<R>>> {
        self.loaders.get(name)
    }

    /// The redirector
    #[must_use]
    pub fn redirector(&self) -> &dyn Redirector<R> {
        self.redirector.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl ViewLoader<String> for Echo {
        fn load(&self, view: &str, data: Map<String, Value>, status: Option<u16>) -> String {
            format!("{view}:{}:{}", data.len(), status.unwrap_or(200))
        }
    }

    #[test]
    fn test_action_table_lookup() {
        let table = ActionTable::new().on("handle_default", |_ctx: &RouteContext| "ok".to_string());
        assert!(table.action("handle_default").is_some());
        assert!(table.action("handle_missing").is_none());
    }

    #[test]
    fn test_dispatcher_registry() {
        let dispatcher = Dispatcher::new(|uri: &str| format!("redirect:{uri}"))
            .controller("users", ActionTable::new())
            .loader("views", Echo);

        assert!(dispatcher.get_controller("users").is_some());
        assert!(dispatcher.get_controller("posts").is_none());
        assert!(dispatcher.get_loader("views").is_some());
        assert_eq!(dispatcher.redirector().redirect("/home"), "redirect:/home");

        let loader = dispatcher.get_loader("views").unwrap();
        assert_eq!(loader.load("about", Map::new(), Some(404)), "about:0:404");
    }
}
