//! Result envelope for response actions.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Instant;

/// Outcome of a response action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// Result of a response action (isolation, termination, ...).
///
/// Response actions never return `Err`: every internal failure is captured
/// here with `status == Error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub data: serde_json::Value,
    pub message: Option<String>,
    /// Elapsed wall time in seconds.
    pub execution_time: f64,
}

impl ToolResult {
    /// Creates a successful result timed from `started`.
    pub fn success(data: serde_json::Value, message: impl Into<String>, started: Instant) -> Self {
        Self {
            status: ToolStatus::Success,
            data,
            message: Some(message.into()),
            execution_time: started.elapsed().as_secs_f64(),
        }
    }

    /// Creates a failed result timed from `started`.
    pub fn error(message: impl Into<String>, started: Instant) -> Self {
        Self {
            status: ToolStatus::Error,
            data: serde_json::Value::Null,
            message: Some(message.into()),
            execution_time: started.elapsed().as_secs_f64(),
        }
    }

    /// Folds a fallible action body into a result.
    pub fn capture<E: Display>(
        started: Instant,
        outcome: Result<(serde_json::Value, String), E>,
    ) -> Self {
        match outcome {
            Ok((data, message)) => Self::success(data, message, started),
            Err(e) => Self::error(e.to_string(), started),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let result = ToolResult::success(json!({"job_id": "j-1"}), "triggered", Instant::now());
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["status"], "success");
        assert_eq!(value["data"]["job_id"], "j-1");
        assert_eq!(value["message"], "triggered");
        assert!(value["execution_time"].as_f64().unwrap() >= 0.0);
    }

    #[test]
    fn test_capture_error() {
        let outcome: Result<(serde_json::Value, String), String> = Err("host not found".into());
        let result = ToolResult::capture(Instant::now(), outcome);

        assert!(!result.is_success());
        assert_eq!(result.status, ToolStatus::Error);
        assert_eq!(result.message.as_deref(), Some("host not found"));
        assert!(result.data.is_null());
    }
}
