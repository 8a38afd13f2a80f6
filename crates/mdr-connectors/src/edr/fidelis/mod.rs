//! Fidelis Endpoint pack.

pub mod client;
pub mod mapper;

pub use client::{EventQuery, FidelisApi, FidelisHttpClient};

use crate::config::{PackConfig, PackConfigExt};
use crate::normalize::EventCategory;
use crate::traits::{AdapterError, AdapterResult, EndpointAdapter};
use async_trait::async_trait;
use mdr_core::{Alert, ProcessRecord, RawRecord, ToolResult};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Pack id of this vendor.
pub const PACK_ID: &str = "fidelis";

const ISOLATE_SCRIPT_KEY: &str = "fidelis_isolate_script_id";
const TERMINATE_SCRIPT_KEY: &str = "fidelis_terminate_process_script_id";

/// Adapter for Fidelis Endpoint.
pub struct FidelisAdapter {
    tenant_id: String,
    config: PackConfig,
    client: Arc<dyn FidelisApi>,
}

impl FidelisAdapter {
    /// Builds an adapter with an HTTPS client derived from `config`.
    pub fn new(tenant_id: &str, config: &PackConfig) -> AdapterResult<Self> {
        let client = FidelisHttpClient::from_config(config)?;
        Ok(Self::with_client(tenant_id, config.clone(), Arc::new(client)))
    }

    pub fn with_client(tenant_id: &str, config: PackConfig, client: Arc<dyn FidelisApi>) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            config,
            client,
        }
    }

    fn script_id(&self, key: &str) -> AdapterResult<String> {
        self.config
            .get_string(key)
            .ok_or_else(|| AdapterError::Config(format!("'{}' is not configured", key)))
    }

    /// First matching endpoint record for a hostname.
    async fn find_endpoint(&self, hostname: &str) -> AdapterResult<Value> {
        let response = self.client.get_host_info(hostname).await?;
        response
            .pointer("/data/entities/0")
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(format!("Host not found: {}", hostname)))
    }

    async fn endpoint_ip(&self, hostname: &str) -> AdapterResult<String> {
        let endpoint = self.find_endpoint(hostname).await?;
        endpoint
            .get("ipAddress")
            .and_then(Value::as_str)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AdapterError::NotFound(format!("No IP address known for {}", hostname)))
    }

    async fn run_script(
        &self,
        script_key: &str,
        hostname: &str,
        answer: &str,
    ) -> AdapterResult<(Value, String)> {
        let script_id = self.script_id(script_key)?;
        let ip = self.endpoint_ip(hostname).await?;
        let job_id = self.client.execute_script(&script_id, &ip, answer).await?;
        Ok((
            json!({"hostname": hostname, "ip_address": ip, "job_id": job_id}),
            script_id,
        ))
    }
}

#[async_trait]
impl EndpointAdapter for FidelisAdapter {
    fn vendor(&self) -> &str {
        mapper::VENDOR_NAME
    }

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn event_category(&self, raw: &RawRecord) -> Option<EventCategory> {
        mapper::event_category(raw)
    }

    fn normalize_alert(&self, raw: &RawRecord) -> AdapterResult<Alert> {
        mapper::map_alert(&self.tenant_id, raw)
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn list_processes(&self, hostname: &str) -> AdapterResult<Vec<ProcessRecord>> {
        let response = self
            .client
            .query_events(&EventQuery::equals("Process", "EndpointName", hostname))
            .await?;

        let events = response
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let processes: Vec<ProcessRecord> = events
            .iter()
            .filter_map(|event| event.get("telemetry").and_then(mapper::parse_telemetry))
            .filter_map(|telemetry| process_from_telemetry(&telemetry))
            .filter(|process| seen.insert(process.pid))
            .collect();

        debug!(hostname, count = processes.len(), "Listed Fidelis processes");
        Ok(processes)
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn isolate_host(&self, hostname: &str) -> ToolResult {
        let started = Instant::now();
        let outcome = self
            .run_script(ISOLATE_SCRIPT_KEY, hostname, "")
            .await
            .map(|(data, script)| {
                info!(hostname, script = %script, "Fidelis isolation job created");
                (data, format!("Isolation triggered for {}", hostname))
            });
        ToolResult::capture(started, outcome)
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn terminate_process(&self, hostname: &str, pid: u32) -> ToolResult {
        let started = Instant::now();
        let outcome = self
            .run_script(TERMINATE_SCRIPT_KEY, hostname, &pid.to_string())
            .await
            .map(|(mut data, script)| {
                info!(hostname, pid, script = %script, "Fidelis termination job created");
                data["pid"] = json!(pid);
                (data, format!("Termination of process {} triggered on {}", pid, hostname))
            });
        ToolResult::capture(started, outcome)
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn get_host_details(&self, hostname: &str) -> AdapterResult<Value> {
        self.find_endpoint(hostname).await
    }
}

fn process_from_telemetry(telemetry: &RawRecord) -> Option<ProcessRecord> {
    let number = |key: &str| {
        telemetry
            .get(key)
            .and_then(mapper::as_i64)
            .and_then(|n| u32::try_from(n).ok())
    };
    let text = |key: &str| {
        telemetry
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut process = ProcessRecord::new(number("PID")?);
    process.ppid = number("PPID");
    process.name = text("Name");
    process.command_line = text("CommandLine");
    process.executable_path = text("Path");
    process.username = text("User");

    let hashes: HashMap<String, String> = [("md5", "HashMD5"), ("sha256", "HashSHA256")]
        .into_iter()
        .filter_map(|(algo, key)| text(key).map(|digest| (algo.to_string(), digest)))
        .collect();
    if !hashes.is_empty() {
        process.hash = Some(hashes);
    }
    Some(process)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFidelisApi;
    use mdr_core::ToolStatus;

    fn adapter_with(stub: Arc<StubFidelisApi>, config: PackConfig) -> FidelisAdapter {
        FidelisAdapter::with_client("tenant-a", config, stub)
    }

    fn scripted_config() -> PackConfig {
        let mut config = PackConfig::new();
        config.insert(ISOLATE_SCRIPT_KEY.into(), json!("script-iso"));
        config.insert(TERMINATE_SCRIPT_KEY.into(), json!("script-kill"));
        config
    }

    #[tokio::test]
    async fn test_list_processes_dedupes_by_pid() {
        let stub = Arc::new(StubFidelisApi::default());
        let adapter = adapter_with(Arc::clone(&stub), PackConfig::new());

        let processes = adapter.list_processes("PC-01").await.unwrap();
        let pids: Vec<u32> = processes.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![4242, 1337]);

        let first = &processes[0];
        assert_eq!(first.ppid, Some(600));
        assert_eq!(first.name.as_deref(), Some("invoice.exe"));
        assert_eq!(first.hash.as_ref().unwrap()["md5"], "d41d8cd98f00b204e9800998ecf8427e");
        assert!(first.runs_from_downloads());

        let queries = stub.event_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].entity_type, "Process");
        assert_eq!(queries[0].column, "EndpointName");
        assert_eq!(queries[0].value, "PC-01");
    }

    #[tokio::test]
    async fn test_isolate_runs_script_against_host_ip() {
        let stub = Arc::new(StubFidelisApi::default());
        let adapter = adapter_with(Arc::clone(&stub), scripted_config());

        let result = adapter.isolate_host("PC-01").await;
        assert_eq!(result.status, ToolStatus::Success);
        assert_eq!(result.data["ip_address"], "192.168.1.10");
        assert_eq!(result.data["job_id"], "job-1");
        assert_eq!(
            stub.scripts_run(),
            vec![("script-iso".to_string(), "192.168.1.10".to_string(), String::new())]
        );
    }

    #[tokio::test]
    async fn test_terminate_passes_pid_as_answer() {
        let stub = Arc::new(StubFidelisApi::default());
        let adapter = adapter_with(Arc::clone(&stub), scripted_config());

        let result = adapter.terminate_process("PC-01", 4242).await;
        assert!(result.is_success());
        assert_eq!(result.data["pid"], 4242);
        assert_eq!(stub.scripts_run()[0].2, "4242");
    }

    #[tokio::test]
    async fn test_response_actions_capture_failures() {
        let stub = Arc::new(StubFidelisApi::default());

        let unconfigured = adapter_with(Arc::clone(&stub), PackConfig::new());
        let result = unconfigured.isolate_host("PC-01").await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.message.unwrap().contains(ISOLATE_SCRIPT_KEY));

        let adapter = adapter_with(Arc::clone(&stub), scripted_config());
        let result = adapter.terminate_process("GHOST-99", 1).await;
        assert_eq!(result.status, ToolStatus::Error);
        assert!(result.message.unwrap().contains("GHOST-99"));
        assert!(stub.scripts_run().is_empty());
    }

    #[tokio::test]
    async fn test_host_details() {
        let adapter = adapter_with(Arc::new(StubFidelisApi::default()), PackConfig::new());

        let details = adapter.get_host_details("PC-01").await.unwrap();
        assert_eq!(details["hostName"], "PC-01");

        let err = adapter.get_host_details("GHOST-99").await.unwrap_err();
        assert!(matches!(err, AdapterError::NotFound(_)));
    }
}
