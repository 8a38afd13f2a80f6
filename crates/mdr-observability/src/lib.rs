//! # mdr-observability
//!
//! Logging and metrics infrastructure for the MDR orchestrator.
//!
//! Logging uses the tracing ecosystem; metrics go through the `metrics`
//! facade and stay no-ops until the host process installs a recorder.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_config, LogFormat, LoggingConfig};
pub use metrics::MetricsCollector;
