//! Tracing subscriber setup shared by every MDR binary and test harness.
//!
//! `RUST_LOG` wins when set. Otherwise only the `mdr_*` crates log, at the
//! level carried by [`LoggingConfig`].

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Crates whose events are enabled by the fallback filter.
const MDR_CRATES: &[&str] = &[
    "mdr_core",
    "mdr_connectors",
    "mdr_actions",
    "mdr_agent",
    "mdr_observability",
];

/// How each event is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human output.
    Text,
    /// Multi-line human output with span context indented.
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Verbosity of the `mdr_*` crates when `RUST_LOG` is unset.
    pub level: Level,
    pub format: LogFormat,
    /// Emit an event when an investigation or tool span opens and closes.
    pub span_lifecycle: bool,
    /// Source file and line of each event.
    pub source_location: bool,
    pub thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(Level::INFO, LogFormat::Text)
    }
}

impl LoggingConfig {
    /// Settings for `format` at `level`. Span lifecycle and source
    /// location are on for human formats and off for JSON.
    pub fn new(level: Level, format: LogFormat) -> Self {
        let human = format != LogFormat::Json;
        Self {
            level,
            format,
            span_lifecycle: human,
            source_location: human,
            thread_ids: false,
        }
    }

    /// Debug-level pretty output with thread ids, for local runs.
    pub fn development() -> Self {
        Self {
            thread_ids: true,
            ..Self::new(Level::DEBUG, LogFormat::Pretty)
        }
    }

    /// Info-level JSON lines.
    pub fn production() -> Self {
        Self::new(Level::INFO, LogFormat::Json)
    }

    /// Parses a level name (`trace`, `debug`, `info`, `warn`, `error`).
    ///
    /// Unknown names leave the level unchanged.
    pub fn with_level_name(mut self, name: &str) -> Self {
        if let Ok(level) = name.parse::<Level>() {
            self.level = level;
        }
        self
    }

    /// Fallback filter used when `RUST_LOG` is unset, e.g.
    /// `mdr_core=INFO,mdr_connectors=INFO,...`.
    pub fn default_directives(&self) -> String {
        MDR_CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.span_lifecycle {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer()
            .with_span_events(span_events)
            .with_file(self.source_location)
            .with_line_number(self.source_location)
            .with_thread_ids(self.thread_ids);

        match self.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Json => layer.json().boxed(),
        }
    }
}

/// Installs a text subscriber at INFO.
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::default());
}

/// Installs a subscriber built from `config`.
///
/// Only the first call in a process takes effect.
pub fn init_logging_with_config(config: LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    let _ = tracing_subscriber::registry()
        .with(config.fmt_layer().with_filter(env_filter))
        .try_init();
}

/// Opens the span an investigation runs in.
#[macro_export]
macro_rules! investigation_span {
    ($investigation_id:expr, $alert_id:expr) => {
        tracing::info_span!(
            "investigation",
            investigation_id = %$investigation_id,
            alert_id = %$alert_id
        )
    };
}

/// Opens the span one tool call runs in.
#[macro_export]
macro_rules! tool_span {
    ($tool_name:expr, $call_id:expr) => {
        tracing::info_span!("tool", tool = %$tool_name, call_id = %$call_id)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_info_text() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Text);
        assert!(config.span_lifecycle);
    }

    #[test]
    fn test_json_drops_human_extras() {
        let config = LoggingConfig::production();
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.span_lifecycle);
        assert!(!config.source_location);
    }

    #[test]
    fn test_development_is_verbose() {
        let config = LoggingConfig::development();
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.thread_ids);
    }

    #[test]
    fn test_level_name_override() {
        let config = LoggingConfig::default().with_level_name("warn");
        assert_eq!(config.level, Level::WARN);

        let unchanged = LoggingConfig::default().with_level_name("loud");
        assert_eq!(unchanged.level, Level::INFO);
    }

    #[test]
    fn test_default_directives_cover_all_crates() {
        let directives = LoggingConfig::development().default_directives();
        assert!(directives.contains("mdr_agent=DEBUG"));
        assert!(directives.contains("mdr_connectors=DEBUG"));
        assert_eq!(directives.split(',').count(), MDR_CRATES.len());
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging();
        init_logging_with_config(LoggingConfig::production());
    }
}
