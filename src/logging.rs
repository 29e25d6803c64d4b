//! Diagnostic logging
//!
//! Log records go to stderr, which the worker shares. The filter comes from
//! RELAYD_LOG using `tracing_subscriber::EnvFilter` syntax and defaults to
//! `warn`, so a healthy daemon stays quiet and a fatal error remains the
//! last line it prints.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directive
pub const LOG_ENV: &str = "RELAYD_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Filter built from `directive`, falling back to the default on parse errors
pub fn filter(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Safe to call more than once.
pub fn init() {
    let directive = std::env::var(LOG_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(directive.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(filter(None).to_string().contains("warn"));
    }

    #[test]
    fn test_custom_filter() {
        assert!(filter(Some("relayd=debug")).to_string().contains("relayd=debug"));
    }

    #[test]
    fn test_invalid_filter_falls_back() {
        assert_eq!(
            filter(Some("relayd=notalevel")).to_string(),
            filter(None).to_string()
        );
    }

    #[test]
    fn test_init_twice() {
        init();
        init();
    }
}
