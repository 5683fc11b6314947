/// Initialize tracing/logging for the driver and the worker binary.
///
/// This uses a simple `with_max_level` configuration based on `default_level`.
pub fn init(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(parse_level(default_level))
        .with_target(false)
        .try_init();
}

/// Unknown names fall back to `INFO`.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        init("info");
        init("debug");
        init("warn");
    }

    #[test]
    fn parse_level_is_case_insensitive() {
        assert_eq!(parse_level("WARNING"), tracing::Level::WARN);
        assert_eq!(parse_level(" Debug "), tracing::Level::DEBUG);
        assert_eq!(parse_level("verbose"), tracing::Level::INFO);
    }
}
