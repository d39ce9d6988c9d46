//! Structured logging setup.
//!
//! Logs go to stderr so stdout stays clean for tables and CSV. `RUST_LOG`
//! wins when set; otherwise `LOG_LEVEL` (default `info`) is used.

use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

/// Filter directive from `RUST_LOG` / `LOG_LEVEL` values.
pub fn filter_directive(rust_log: Option<&str>, log_level: Option<&str>) -> String {
    let pick = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    pick(rust_log)
        .or_else(|| pick(log_level).map(|s| s.to_lowercase()))
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

/// Install the global subscriber. Safe to call more than once.
pub fn init() {
    let rust_log = std::env::var("RUST_LOG").ok();
    let log_level = std::env::var("LOG_LEVEL").ok();
    let directive = filter_directive(rust_log.as_deref(), log_level.as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_wins() {
        assert_eq!(
            filter_directive(Some("mptrack_runner=debug"), Some("WARN")),
            "mptrack_runner=debug"
        );
    }

    #[test]
    fn log_level_fallback() {
        assert_eq!(filter_directive(None, Some("WARN")), "warn");
        assert_eq!(filter_directive(Some("  "), None), "info");
        assert_eq!(filter_directive(None, None), "info");
    }
}
