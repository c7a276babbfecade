//! # Waypost Core
//!
//! URL routing and request dispatch.
//! Maps an inbound request onto a registered route, assembles a merged
//! parameter context for it, and rebuilds canonical URIs for named routes.
//!
//! ## Modules
//!
//! - `router` - Ordered route registry, matching, context assembly, reverse building
//! - `route` - Route definitions and compiled routes (match + build)
//! - `pattern` - URI template parsing and regex compilation
//! - `filter` - Named regex fragments for placeholders
//! - `negotiate` - `Content-Type` / `Accept` negotiation
//! - `multipart` - `multipart/form-data` body decoding and temp-file uploads
//! - `form` - `application/x-www-form-urlencoded` decoding
//! - `json` - JSON body decoding with simd-json
//! - `request` - Inbound request model and hyper adapter
//! - `context` - Per-request route context handed to dispatch targets
//! - `dispatch` - Controller, view loader and redirect collaborators
//! - `config` - Router configuration
//! - `logging` - Tracing subscriber setup
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod form;
pub mod json;
pub mod logging;
pub mod multipart;
pub mod negotiate;
pub mod pattern;
pub mod request;
pub mod route;
pub mod router;

pub use config::RouterConfig;
pub use context::{ContextValue, PathParams, RouteContext};
pub use dispatch::{Action, ActionTable, Dispatchable, Dispatcher, Redirector, ViewLoader};
pub use error::{Error, Result};
pub use filter::{Filter, FilterRegistry};
pub use multipart::{cleanup_uploads, parse_multipart, FormData, UploadedFile};
pub use negotiate::{BodyFormat, Negotiator};
pub use pattern::PlaceholderSyntax;
pub use request::Request;
pub use route::{BuildOptions, BuildParams, Route, RouteDef, Target};
pub use router::{Method, RedirectOptions, RouteTable, Router};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
