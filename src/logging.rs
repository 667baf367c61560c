//! Structured logging setup.
//!
//! Logs go to **stderr**; stdout carries only the handshake line.
//!
//! Filter selection, first match wins:
//!
//! 1. `RUST_LOG`, any `EnvFilter` directive
//!    (e.g. `tencentcloud_vpc_provider=debug,tonic=warn`)
//! 2. `TF_LOG` / `TF_LOG_PROVIDER` (`TRACE`, `DEBUG`, `INFO`, `WARN`,
//!    `ERROR`, or `JSON`, which selects `trace`)
//! 3. the supplied default, `info` for [`init_logging`]

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a `TF_LOG`-style level onto an `EnvFilter` directive.
pub fn tf_log_directive(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "JSON" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        "OFF" => Some("off"),
        _ => None,
    }
}

fn build_filter_from(
    lookup: impl Fn(&str) -> Option<String>,
    default_level: &str,
) -> EnvFilter {
    if let Some(directives) = lookup("RUST_LOG").filter(|v| !v.trim().is_empty()) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }

    let tf_level = lookup("TF_LOG_PROVIDER")
        .or_else(|| lookup("TF_LOG"))
        .and_then(|level| tf_log_directive(&level));

    EnvFilter::new(tf_level.unwrap_or(default_level))
}

fn build_filter(default_level: &str) -> EnvFilter {
    build_filter_from(|key| std::env::var(key).ok(), default_level)
}

fn try_init_with(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(build_filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
        .is_ok()
}

/// Install the global subscriber with an `info` default.
///
/// Does nothing if a subscriber is already installed.
pub fn init_logging() {
    try_init_with("info");
}

/// Install the global subscriber with a custom default level.
pub fn init_logging_with_default(default_level: &str) {
    try_init_with(default_level);
}

/// Install the global subscriber, returning `false` if one was already set.
pub fn try_init_logging() -> bool {
    try_init_with("info")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_tf_log_mapping() {
        assert_eq!(tf_log_directive("DEBUG"), Some("debug"));
        assert_eq!(tf_log_directive("trace"), Some("trace"));
        assert_eq!(tf_log_directive("JSON"), Some("trace"));
        assert_eq!(tf_log_directive(" warn "), Some("warn"));
        assert_eq!(tf_log_directive("verbose"), None);
    }

    #[test]
    fn test_rust_log_wins() {
        let filter = build_filter_from(
            lookup(&[("RUST_LOG", "tencentcloud_vpc_provider=trace"), ("TF_LOG", "ERROR")]),
            "info",
        );
        assert!(filter.to_string().contains("tencentcloud_vpc_provider=trace"));
    }

    #[test]
    fn test_tf_log_fallback() {
        let filter = build_filter_from(lookup(&[("TF_LOG", "DEBUG")]), "info");
        assert_eq!(filter.to_string(), "debug");

        let filter =
            build_filter_from(lookup(&[("TF_LOG", "DEBUG"), ("TF_LOG_PROVIDER", "WARN")]), "info");
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn test_default_level() {
        let filter = build_filter_from(lookup(&[]), "info");
        assert_eq!(filter.to_string(), "info");
    }
}
