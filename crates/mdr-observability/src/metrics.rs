//! Metrics collection for the MDR orchestrator.
//!
//! Thin wrapper over the `metrics` facade. Nothing is exported until the
//! host process installs a recorder (Prometheus, statsd, ...).

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::sync::Once;

static DESCRIBE: Once = Once::new();

/// Records pipeline, tool and investigation metrics.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    /// Creates a collector and registers metric descriptions once per process.
    pub fn new() -> Self {
        DESCRIBE.call_once(Self::register_metrics);
        Self
    }

    fn register_metrics() {
        describe_counter!(
            "mdr_alerts_normalized_total",
            "Total number of alerts that passed the normalization pipeline"
        );
        describe_counter!(
            "mdr_alerts_rejected_total",
            "Total number of alerts rejected by the normalization pipeline"
        );
        describe_counter!(
            "mdr_tool_executions_total",
            "Total number of tool executions requested by the reasoning backend"
        );
        describe_histogram!(
            "mdr_tool_duration_seconds",
            "Tool execution duration"
        );
        describe_counter!(
            "mdr_backend_calls_total",
            "Total number of reasoning backend round-trips"
        );
        describe_histogram!(
            "mdr_backend_latency_seconds",
            "Reasoning backend round-trip latency"
        );
        describe_counter!(
            "mdr_investigations_total",
            "Total number of investigations by outcome"
        );
    }

    /// Records an alert normalized for a vendor.
    pub fn record_alert_normalized(&self, vendor: &str, severity: &str) {
        counter!("mdr_alerts_normalized_total", "vendor" => vendor.to_string(), "severity" => severity.to_string()).increment(1);
    }

    /// Records an alert rejected by validation.
    pub fn record_alert_rejected(&self, vendor: &str) {
        counter!("mdr_alerts_rejected_total", "vendor" => vendor.to_string()).increment(1);
    }

    /// Records a tool execution.
    pub fn record_tool_execution(&self, tool: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        counter!("mdr_tool_executions_total", "tool" => tool.to_string(), "status" => status).increment(1);
        histogram!("mdr_tool_duration_seconds", "tool" => tool.to_string()).record(duration_secs);
    }

    /// Records one backend round-trip.
    pub fn record_backend_call(&self, backend: &str, latency_secs: f64) {
        counter!("mdr_backend_calls_total", "backend" => backend.to_string()).increment(1);
        histogram!("mdr_backend_latency_seconds", "backend" => backend.to_string())
            .record(latency_secs);
    }

    /// Records a finished investigation.
    pub fn record_investigation(&self, outcome: &str, iterations: usize) {
        counter!("mdr_investigations_total", "outcome" => outcome.to_string(), "iterations" => iterations.to_string()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = MetricsCollector::new();
        metrics.record_alert_normalized("fidelis", "HIGH");
        metrics.record_alert_rejected("fidelis");
        metrics.record_tool_execution("isolate_host", true, 0.2);
        metrics.record_backend_call("openai", 1.5);
        metrics.record_investigation("done", 2);
    }

    #[test]
    fn test_new_is_idempotent() {
        let _a = MetricsCollector::new();
        let _b = MetricsCollector::new();
    }
}
