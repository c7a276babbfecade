//! # Logging
//!
//! The router logs through `tracing` under four targets:
//!
//! - `waypost::init` - route registration and compilation
//! - `waypost::matching` - per-route match attempts
//! - `waypost::routing` - dispatch decisions
//! - `waypost::building` - reverse URI building
//!
//! Pick verbosity with `RUST_LOG`, e.g. `RUST_LOG=waypost::matching=trace`.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset or invalid
pub const DEFAULT_DIRECTIVE: &str = "waypost=info";

/// Filter from `directives`, falling back to [`DEFAULT_DIRECTIVE`]
fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install a global fmt subscriber
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(json: bool) -> bool {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter_from(env.as_deref().filter(|d| !d.trim().is_empty()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_default_directive_parses() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVE).is_ok());
        assert_eq!(filter_from(None).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_env_level_is_kept() {
        assert_eq!(filter_from(Some("waypost=debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(
            filter_from(Some("waypost::matching=trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
    }

    #[test]
    fn test_invalid_env_falls_back() {
        assert_eq!(filter_from(Some("waypost=loudest")).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let _ = init_tracing(false);
        assert!(!init_tracing(true));
    }
}
