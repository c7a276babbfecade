//! # Error Handling
//!
//! Centralized error types for Waypost core.
//! Uses `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Result type alias for Waypost operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the routing engine
#[derive(Error, Debug)]
pub enum Error {
    /// No route matched and no default route is registered
    #[error("No route matched {method} {uri}, and no default route set")]
    NoRouteMatched {
        /// Request method
        method: String,
        /// Request URI (query string stripped)
        uri: String,
    },

    /// A route cannot be turned into something dispatchable
    #[error("Invalid route definition for {route}: {reason}")]
    InvalidRouteDefinition {
        /// Route name or pattern
        route: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Reverse building left placeholders unresolved
    #[error("Building {route} is missing: {}", missing.join(", "))]
    BuildMissingParameter {
        /// Route pattern being built
        route: String,
        /// Placeholder names with no value
        missing: Vec<String>,
    },

    /// Reverse building got values their placeholder filters reject
    #[error("Building {route} got values its filters reject: {}", invalid.join(", "))]
    BuildInvalidParameter {
        /// Route pattern being built
        route: String,
        /// Placeholder names whose value does not match
        invalid: Vec<String>,
    },

    /// Reverse lookup of a name that was never registered
    #[error("No named route '{name}'")]
    UnknownNamedRoute {
        /// The requested route name
        name: String,
    },

    /// Dispatch target references an unregistered controller
    #[error("Controller '{name}' not found")]
    ControllerNotFound {
        /// Controller name
        name: String,
    },

    /// Controller exists but does not expose the action
    #[error("Controller action {action} not found on {controller}")]
    ActionNotFound {
        /// Controller name
        controller: String,
        /// Action name
        action: String,
    },

    /// View target references an unregistered loader
    #[error("View loader '{name}' not found")]
    ViewLoaderNotFound {
        /// Loader name
        name: String,
    },

    /// JSON request body failed to parse (strict mode only)
    #[error("Malformed JSON body: {reason}")]
    MalformedJsonBody {
        /// Parser message
        reason: String,
    },

    /// Request method outside the recognised set
    #[error("Unsupported HTTP method: {method}")]
    UnsupportedMethod {
        /// The raw method string
        method: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },

    /// The request body could not be read
    #[error("Failed to read request body: {reason}")]
    BodyRead {
        /// Error reported by the body stream
        reason: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
