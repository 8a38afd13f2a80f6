//! Canonical process record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A process observed on an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessRecord {
    /// Process ID.
    pub pid: u32,
    /// Parent process ID.
    pub ppid: Option<u32>,
    /// Process image name.
    pub name: Option<String>,
    /// Full command line.
    pub command_line: Option<String>,
    /// Path of the executable on disk.
    pub executable_path: Option<String>,
    /// Account the process runs as.
    pub username: Option<String>,
    /// Process start time, if the vendor reports it.
    pub start_time: Option<DateTime<Utc>>,
    /// Image hashes keyed by algorithm (`md5`, `sha256`, ...).
    pub hash: Option<HashMap<String, String>>,
}

impl ProcessRecord {
    /// Creates a record with only a pid.
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            ppid: None,
            name: None,
            command_line: None,
            executable_path: None,
            username: None,
            start_time: None,
            hash: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_executable_path(mut self, path: impl Into<String>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Whether the executable lives under a user download directory.
    pub fn runs_from_downloads(&self) -> bool {
        self.executable_path
            .as_deref()
            .map(|p| p.to_ascii_lowercase().contains("downloads"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_from_downloads() {
        let p = ProcessRecord::new(42).with_executable_path(r"C:\Users\bob\Downloads\invoice.exe");
        assert!(p.runs_from_downloads());

        let q = ProcessRecord::new(43).with_executable_path(r"C:\Windows\System32\svchost.exe");
        assert!(!q.runs_from_downloads());

        assert!(!ProcessRecord::new(44).runs_from_downloads());
    }

    #[test]
    fn test_optional_fields_serialize_as_null() {
        let value = serde_json::to_value(ProcessRecord::new(7).with_name("cmd.exe")).unwrap();
        assert_eq!(value["pid"], 7);
        assert_eq!(value["name"], "cmd.exe");
        assert!(value["ppid"].is_null());
    }
}
