//! In-memory adapter for tests.
//!
//! Holds a small host inventory with processes, records every response
//! action and supports failure injection.

use crate::traits::{AdapterError, AdapterResult, EndpointAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mdr_core::{Alert, Entity, EntityType, ProcessRecord, RawRecord, Severity, ToolResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;

/// Pack id used when the mock is registered.
pub const PACK_ID: &str = "mock";

pub const VENDOR_NAME: &str = "Mock EDR";

/// Failure injection.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    #[default]
    Normal,
    /// Isolation fails with the given message; everything else works.
    FailIsolation(String),
    /// Every vendor call after the first `calls` fails.
    FailAfter { calls: u64, message: String },
    /// Every vendor call fails.
    AlwaysFail(String),
}

/// Record of a response action for test verification.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub action_type: String,
    pub hostname: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

#[derive(Debug, Clone)]
struct MockHost {
    details: Value,
    processes: Vec<ProcessRecord>,
    isolated: bool,
}

/// Mock endpoint adapter.
pub struct MockAdapter {
    tenant_id: String,
    hosts: RwLock<HashMap<String, MockHost>>,
    behavior: RwLock<MockBehavior>,
    call_count: AtomicU64,
    action_history: RwLock<Vec<ActionRecord>>,
}

impl MockAdapter {
    /// Creates a mock with no hosts.
    pub fn new(tenant_id: &str) -> Self {
        Self::with_hosts(tenant_id, HashMap::new())
    }

    /// Creates a mock with a workstation and a server.
    pub fn with_sample_data(tenant_id: &str) -> Self {
        let mut hosts = HashMap::new();
        hosts.insert(
            "workstation-001".to_string(),
            MockHost {
                details: json!({
                    "hostname": "workstation-001",
                    "ip_address": "192.168.1.100",
                    "os": "Windows 10 Enterprise 21H2",
                    "agent_version": "7.1.0"
                }),
                processes: vec![
                    ProcessRecord::new(4).with_name("System"),
                    ProcessRecord::new(1204)
                        .with_name("explorer.exe")
                        .with_executable_path(r"C:\Windows\explorer.exe"),
                    ProcessRecord::new(6620)
                        .with_name("invoice.exe")
                        .with_executable_path(r"C:\Users\alice\Downloads\invoice.exe"),
                ],
                isolated: false,
            },
        );
        hosts.insert(
            "server-001".to_string(),
            MockHost {
                details: json!({
                    "hostname": "server-001",
                    "ip_address": "10.0.0.50",
                    "os": "Ubuntu 22.04 LTS",
                    "agent_version": "7.1.0"
                }),
                processes: vec![ProcessRecord::new(1).with_name("systemd")],
                isolated: false,
            },
        );
        Self::with_hosts(tenant_id, hosts)
    }

    fn with_hosts(tenant_id: &str, hosts: HashMap<String, MockHost>) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            hosts: RwLock::new(hosts),
            behavior: RwLock::new(MockBehavior::Normal),
            call_count: AtomicU64::new(0),
            action_history: RwLock::new(Vec::new()),
        }
    }

    /// Adds or replaces a host.
    pub async fn add_host(&self, hostname: &str, details: Value, processes: Vec<ProcessRecord>) {
        self.hosts.write().await.insert(
            hostname.to_string(),
            MockHost {
                details,
                processes,
                isolated: false,
            },
        );
    }

    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// Number of vendor calls made so far.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    pub async fn action_history(&self) -> Vec<ActionRecord> {
        self.action_history.read().await.clone()
    }

    pub async fn is_isolated(&self, hostname: &str) -> bool {
        self.hosts
            .read()
            .await
            .get(hostname)
            .map(|h| h.isolated)
            .unwrap_or(false)
    }

    async fn check_behavior(&self) -> AdapterResult<()> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        match &*self.behavior.read().await {
            MockBehavior::Normal | MockBehavior::FailIsolation(_) => Ok(()),
            MockBehavior::FailAfter { calls, message } if count > *calls => {
                Err(AdapterError::VendorOperation(message.clone()))
            }
            MockBehavior::FailAfter { .. } => Ok(()),
            MockBehavior::AlwaysFail(message) => Err(AdapterError::VendorOperation(message.clone())),
        }
    }

    async fn record_action(&self, action_type: &str, hostname: &str, success: bool) {
        self.action_history.write().await.push(ActionRecord {
            action_type: action_type.to_string(),
            hostname: hostname.to_string(),
            timestamp: Utc::now(),
            success,
        });
    }

    async fn try_isolate(&self, hostname: &str) -> AdapterResult<(Value, String)> {
        if let MockBehavior::FailIsolation(message) = &*self.behavior.read().await {
            return Err(AdapterError::VendorOperation(message.clone()));
        }
        self.check_behavior().await?;

        let mut hosts = self.hosts.write().await;
        let host = hosts
            .get_mut(hostname)
            .ok_or_else(|| AdapterError::NotFound(format!("Host not found: {}", hostname)))?;
        if host.isolated {
            return Err(AdapterError::VendorOperation(format!(
                "Host {} is already isolated",
                hostname
            )));
        }
        host.isolated = true;
        Ok((
            json!({"hostname": hostname, "isolated": true}),
            format!("Host {} isolated successfully", hostname),
        ))
    }

    async fn try_unisolate(&self, hostname: &str) -> AdapterResult<(Value, String)> {
        self.check_behavior().await?;

        let mut hosts = self.hosts.write().await;
        let host = hosts
            .get_mut(hostname)
            .ok_or_else(|| AdapterError::NotFound(format!("Host not found: {}", hostname)))?;
        if !host.isolated {
            return Err(AdapterError::VendorOperation(format!(
                "Host {} is not isolated",
                hostname
            )));
        }
        host.isolated = false;
        Ok((
            json!({"hostname": hostname, "isolated": false}),
            format!("Host {} released from isolation", hostname),
        ))
    }

    async fn try_terminate(&self, hostname: &str, pid: u32) -> AdapterResult<(Value, String)> {
        self.check_behavior().await?;

        let mut hosts = self.hosts.write().await;
        let host = hosts
            .get_mut(hostname)
            .ok_or_else(|| AdapterError::NotFound(format!("Host not found: {}", hostname)))?;
        let before = host.processes.len();
        host.processes.retain(|p| p.pid != pid);
        if host.processes.len() == before {
            return Err(AdapterError::NotFound(format!(
                "Process {} not found on {}",
                pid, hostname
            )));
        }
        Ok((
            json!({"hostname": hostname, "pid": pid}),
            format!("Process {} terminated on {}", pid, hostname),
        ))
    }
}

#[async_trait]
impl EndpointAdapter for MockAdapter {
    fn vendor(&self) -> &str {
        VENDOR_NAME
    }

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Accepts a flat record: `id`, `title`, `severity` label, `hostname`,
    /// `ip`, `user`, `file_hash`, `timestamp`.
    fn normalize_alert(&self, raw: &RawRecord) -> AdapterResult<Alert> {
        let text = |key: &str| raw.get(key).and_then(Value::as_str).filter(|v| !v.is_empty());

        let severity = match text("severity").map(str::to_ascii_lowercase).as_deref() {
            Some("critical") => Severity::Critical,
            Some("high") => Severity::High,
            Some("medium") => Severity::Medium,
            Some("low") => Severity::Low,
            _ => Severity::Info,
        };
        let entities = [
            ("hostname", EntityType::Host),
            ("ip", EntityType::Ip),
            ("user", EntityType::User),
            ("file_hash", EntityType::File),
        ]
        .into_iter()
        .filter_map(|(key, entity_type)| text(key).map(|value| Entity::new(entity_type, value)));

        let mut builder = Alert::builder(text("id").unwrap_or_default(), VENDOR_NAME, &self.tenant_id)
            .severity(severity)
            .title(text("title").unwrap_or("Mock Alert"))
            .description(text("description").map(str::to_string))
            .entities(entities)
            .raw_data(raw.clone());
        if let Some(ts) = text("timestamp").and_then(|ts| DateTime::parse_from_rfc3339(ts).ok()) {
            builder = builder.timestamp(ts.with_timezone(&Utc));
        }
        Ok(builder.build()?)
    }

    async fn list_processes(&self, hostname: &str) -> AdapterResult<Vec<ProcessRecord>> {
        self.check_behavior().await?;
        Ok(self
            .hosts
            .read()
            .await
            .get(hostname)
            .map(|h| h.processes.clone())
            .unwrap_or_default())
    }

    async fn isolate_host(&self, hostname: &str) -> ToolResult {
        let started = Instant::now();
        let outcome = self.try_isolate(hostname).await;
        self.record_action("isolate", hostname, outcome.is_ok()).await;
        ToolResult::capture(started, outcome)
    }

    async fn unisolate_host(&self, hostname: &str) -> ToolResult {
        let started = Instant::now();
        let outcome = self.try_unisolate(hostname).await;
        self.record_action("unisolate", hostname, outcome.is_ok()).await;
        ToolResult::capture(started, outcome)
    }

    async fn terminate_process(&self, hostname: &str, pid: u32) -> ToolResult {
        let started = Instant::now();
        let outcome = self.try_terminate(hostname, pid).await;
        self.record_action("terminate_process", hostname, outcome.is_ok())
            .await;
        ToolResult::capture(started, outcome)
    }

    async fn get_host_details(&self, hostname: &str) -> AdapterResult<Value> {
        self.check_behavior().await?;
        let hosts = self.hosts.read().await;
        let host = hosts
            .get(hostname)
            .ok_or_else(|| AdapterError::NotFound(format!("Host not found: {}", hostname)))?;
        let mut details = host.details.clone();
        details["isolated"] = json!(host.isolated);
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::as_record;
    use mdr_core::ToolStatus;

    #[tokio::test]
    async fn test_isolation_is_recorded() {
        let mock = MockAdapter::with_sample_data("t1");

        let result = mock.isolate_host("workstation-001").await;
        assert!(result.is_success());
        assert!(mock.is_isolated("workstation-001").await);

        let again = mock.isolate_host("workstation-001").await;
        assert_eq!(again.status, ToolStatus::Error);
        assert!(again.message.unwrap().contains("already isolated"));

        let history = mock.action_history().await;
        assert_eq!(history.len(), 2);
        assert!(history[0].success);
        assert!(!history[1].success);
    }

    #[tokio::test]
    async fn test_unisolate_releases_host() {
        let mock = MockAdapter::with_sample_data("t1");

        let early = mock.unisolate_host("workstation-001").await;
        assert!(early.message.unwrap().contains("is not isolated"));

        assert!(mock.isolate_host("workstation-001").await.is_success());
        let released = mock.unisolate_host("workstation-001").await;
        assert!(released.is_success());
        assert_eq!(released.data["isolated"], false);
        assert!(!mock.is_isolated("workstation-001").await);

        let history = mock.action_history().await;
        assert_eq!(history.last().unwrap().action_type, "unisolate");
    }

    #[tokio::test]
    async fn test_fail_isolation_only_affects_isolation() {
        let mock = MockAdapter::with_sample_data("t1");
        mock.set_behavior(MockBehavior::FailIsolation("API unavailable".into()))
            .await;

        let result = mock.isolate_host("workstation-001").await;
        assert_eq!(result.message.as_deref(), Some("Vendor operation failed: API unavailable"));
        assert_eq!(mock.list_processes("workstation-001").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fail_after() {
        let mock = MockAdapter::with_sample_data("t1");
        mock.set_behavior(MockBehavior::FailAfter {
            calls: 1,
            message: "quota".into(),
        })
        .await;

        assert!(mock.get_host_details("server-001").await.is_ok());
        assert!(mock.get_host_details("server-001").await.is_err());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_terminate_removes_process() {
        let mock = MockAdapter::with_sample_data("t1");
        assert!(mock.terminate_process("workstation-001", 6620).await.is_success());
        assert!(!mock.terminate_process("workstation-001", 6620).await.is_success());
        assert_eq!(mock.list_processes("workstation-001").await.unwrap().len(), 2);
    }

    #[test]
    fn test_normalize_flat_record() {
        let mock = MockAdapter::new("t1");
        let alert = mock
            .normalize_alert(&as_record(json!({
                "id": "m-1",
                "title": "Test",
                "severity": "High",
                "hostname": "workstation-001",
                "file_hash": "abc"
            })))
            .unwrap();

        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.entity_values(EntityType::Host), vec!["workstation-001"]);
        assert_eq!(alert.entity_values(EntityType::File), vec!["abc"]);
    }
}
