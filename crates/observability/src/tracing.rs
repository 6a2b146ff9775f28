//! Tracing/logging initialization.
//!
//! Events go to stdout through `tracing-subscriber`, filtered by `RUST_LOG`.
//! Worker threads are named, so thread names are included in every line.

use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable, for local runs.
    Pretty,
}

impl LogFormat {
    /// `pretty`/`text` select [`LogFormat::Pretty`]; anything else is JSON.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl TracingConfig {
    /// Reads `LOG_FORMAT`.
    pub fn from_env() -> Self {
        let format = std::env::var("LOG_FORMAT")
            .map(|raw| LogFormat::parse(&raw))
            .unwrap_or_default();
        Self {
            format,
            ..Self::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.default_filter))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(config: TracingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_thread_names(true)
        .with_target(false);

    match config.format {
        LogFormat::Json => builder.json().with_current_span(true).try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_leniently() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(" TEXT "), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    #[test]
    fn second_init_is_a_noop() {
        init(TracingConfig::default());
        assert!(!init(TracingConfig::default()));
    }
}
