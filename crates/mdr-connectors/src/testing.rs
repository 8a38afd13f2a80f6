//! Testing harness for packs and adapters.
//!
//! Sample vendor payloads, pack-root fixtures and canned vendor clients that
//! let adapters run without network access.

use crate::config::PackConfig;
use crate::edr::fidelis::{EventQuery, FidelisAdapter, FidelisApi};
use crate::edr::trendmicro::VisionOneApi;
use crate::registry::{PackMetadata, METADATA_FILE};
use crate::traits::AdapterResult;
use async_trait::async_trait;
use mdr_core::RawRecord;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Unwraps a JSON object literal into a raw record.
pub fn as_record(value: Value) -> RawRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected a JSON object, got {}", other),
    }
}

/// A Fidelis alert with a host, an IP and an administrative `links` block.
pub fn sample_fidelis_alert() -> RawRecord {
    as_record(json!({
        "id": 1001,
        "name": "Malicious Process Detected",
        "severity": 4,
        "endpointName": "PC-01",
        "ipAddress": "192.168.1.10",
        "links": {"self": "http://api/1001"}
    }))
}

/// A Vision One workbench alert with host, user and file entities.
pub fn sample_trendmicro_alert() -> RawRecord {
    as_record(json!({
        "id": "WB-9002-20240301-00001",
        "severity": "high",
        "description": "Suspicious PowerShell activity",
        "createdTime": "2024-03-01T08:00:00Z",
        "entities": [
            {"entityType": "host", "entityValue": {"name": "WS-042", "guid": "guid-042"}},
            {"entityType": "user", "entityValue": "jdoe"},
            {"entityType": "file", "entityValue": "5f4dcc3b5aa765d61d8327deb882cf99"}
        ],
        "links": [{"href": "https://portal/WB-9002"}]
    }))
}

/// Metadata for the mock pack.
pub fn mock_pack_metadata() -> PackMetadata {
    PackMetadata {
        display_name: "Mock EDR".to_string(),
        version: "1.0.0".to_string(),
        capabilities: vec![
            "normalize_alert".to_string(),
            "list_processes".to_string(),
            "isolate_host".to_string(),
            "terminate_process".to_string(),
            "get_host_details".to_string(),
        ],
        required_config: Vec::new(),
    }
}

/// Writes `<root>/<vendor>/pack_metadata.json`.
pub fn write_pack_metadata(root: &Path, vendor: &str, metadata: &PackMetadata) -> std::io::Result<()> {
    let dir = root.join(vendor);
    std::fs::create_dir_all(&dir)?;
    let body = serde_json::to_string_pretty(metadata)?;
    std::fs::write(dir.join(METADATA_FILE), body)
}

/// A Fidelis adapter backed by [`StubFidelisApi`].
pub fn fidelis_adapter(tenant_id: &str) -> FidelisAdapter {
    FidelisAdapter::with_client(tenant_id, PackConfig::new(), Arc::new(StubFidelisApi::default()))
}

/// Canned Fidelis API knowing one host, `PC-01`.
#[derive(Default)]
pub struct StubFidelisApi {
    scripts: Mutex<Vec<(String, String, String)>>,
    queries: Mutex<Vec<EventQuery>>,
}

impl StubFidelisApi {
    /// `(script_id, endpoint_ip, answer)` for every script run.
    pub fn scripts_run(&self) -> Vec<(String, String, String)> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn event_queries(&self) -> Vec<EventQuery> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl FidelisApi for StubFidelisApi {
    async fn get_host_info(&self, hostname: &str) -> AdapterResult<Value> {
        let entities = if hostname == "PC-01" {
            json!([{
                "hostName": "PC-01",
                "ipAddress": "192.168.1.10",
                "os": "Windows 10 Pro",
                "isIsolated": false
            }])
        } else {
            json!([])
        };
        Ok(json!({"success": true, "data": {"entities": entities}}))
    }

    async fn execute_script(
        &self,
        script_id: &str,
        endpoint_ip: &str,
        answer: &str,
    ) -> AdapterResult<Value> {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((script_id.to_string(), endpoint_ip.to_string(), answer.to_string()));
        Ok(json!("job-1"))
    }

    async fn query_events(&self, query: &EventQuery) -> AdapterResult<Value> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());

        let invoice = json!({
            "PID": 4242,
            "PPID": 600,
            "Name": "invoice.exe",
            "Path": "C:\\Users\\bob\\Downloads\\invoice.exe",
            "CommandLine": "invoice.exe /silent",
            "User": "CORP\\bob",
            "HashMD5": "d41d8cd98f00b204e9800998ecf8427e"
        });
        let svchost = json!({"PID": 1337, "Name": "svchost.exe", "Path": "C:\\Windows\\System32\\svchost.exe"});
        Ok(json!({
            "data": [
                {"telemetry": invoice.to_string()},
                {"telemetry": invoice.to_string()},
                {"telemetry": "not json"},
                {"telemetry": svchost.to_string()},
                {"eventType": 0}
            ]
        }))
    }
}

/// Canned Vision One API knowing one endpoint, `WS-042`.
#[derive(Default)]
pub struct StubVisionOneApi {
    commands: Mutex<Vec<(String, String, Map<String, Value>)>>,
}

impl StubVisionOneApi {
    /// `(agent_guid, command, params)` for every response command.
    pub fn commands(&self) -> Vec<(String, String, Map<String, Value>)> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl VisionOneApi for StubVisionOneApi {
    async fn search_endpoints(&self, query: &str) -> AdapterResult<Value> {
        let items = if query.contains("'WS-042'") {
            json!([{"agentGuid": "guid-042", "endpointName": "WS-042", "osName": "Windows"}])
        } else {
            json!([])
        };
        Ok(json!({"items": items}))
    }

    async fn run_command(
        &self,
        endpoint_id: &str,
        command: &str,
        params: Map<String, Value>,
    ) -> AdapterResult<Value> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((endpoint_id.to_string(), command.to_string(), params));
        Ok(json!({"status": 202}))
    }

    async fn get_edr_telemetry(&self, _endpoint_id: &str, _kind: &str) -> AdapterResult<Value> {
        Ok(json!({
            "data": [
                {"processId": 812, "parentProcessId": 4, "processName": "powershell.exe",
                 "commandLine": "powershell -enc SQBFAFgA", "imagePath": "C:\\Windows\\System32\\WindowsPowerShell\\v1.0\\powershell.exe"},
                {"processId": "4120", "processName": "chrome.exe", "user": "jdoe"},
                {"processName": "no-pid.exe"}
            ]
        }))
    }
}
