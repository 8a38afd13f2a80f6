//! Trend Micro Vision One pack.

pub mod client;

pub use client::{VisionOneApi, VisionOneHttpClient};

use crate::config::PackConfig;
use crate::traits::{AdapterError, AdapterResult, EndpointAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mdr_core::{Alert, Entity, EntityType, ProcessRecord, RawRecord, Severity, ToolResult};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Pack id of this vendor.
pub const PACK_ID: &str = "trendmicro";

pub const VENDOR_NAME: &str = "Trend Micro Vision One";

const DEFAULT_TITLE: &str = "Vision One Alert";

/// Adapter for Trend Micro Vision One.
pub struct TrendMicroAdapter {
    tenant_id: String,
    client: Arc<dyn VisionOneApi>,
}

impl TrendMicroAdapter {
    pub fn new(tenant_id: &str, config: &PackConfig) -> AdapterResult<Self> {
        let client = VisionOneHttpClient::from_config(config)?;
        Ok(Self::with_client(tenant_id, Arc::new(client)))
    }

    pub fn with_client(tenant_id: &str, client: Arc<dyn VisionOneApi>) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            client,
        }
    }

    async fn find_endpoint(&self, hostname: &str) -> AdapterResult<Option<Value>> {
        let response = self
            .client
            .search_endpoints(&endpoint_filter(hostname))
            .await?;
        Ok(response.pointer("/items/0").cloned())
    }

    async fn endpoint_guid(&self, hostname: &str) -> AdapterResult<String> {
        self.find_endpoint(hostname)
            .await?
            .as_ref()
            .and_then(|endpoint| endpoint.get("agentGuid"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AdapterError::NotFound(format!("Host not found: {}", hostname)))
    }

    async fn command(
        &self,
        hostname: &str,
        command: &str,
        params: Map<String, Value>,
    ) -> AdapterResult<Value> {
        let guid = self.endpoint_guid(hostname).await?;
        let response = self.client.run_command(&guid, command, params).await?;
        info!(hostname, command, "Vision One response command sent");
        Ok(json!({"hostname": hostname, "agent_guid": guid, "response": response}))
    }
}

/// Maps a Vision One severity label. Unknown labels map to `Info`.
pub fn map_severity(label: &str) -> Severity {
    match label.to_ascii_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        _ => Severity::Info,
    }
}

fn map_entity_type(label: &str) -> Option<EntityType> {
    match label.to_ascii_lowercase().as_str() {
        "host" => Some(EntityType::Host),
        "ip" => Some(EntityType::Ip),
        "file" => Some(EntityType::File),
        "user" | "account" => Some(EntityType::User),
        "domain" | "url" => Some(EntityType::Domain),
        "process" => Some(EntityType::Process),
        _ => None,
    }
}

/// `entityValue` is either a string or an object naming the observable.
fn entity_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => map.get("name").and_then(Value::as_str)?.to_string(),
        _ => return None,
    };
    (!text.trim().is_empty()).then_some(text)
}

#[async_trait]
impl EndpointAdapter for TrendMicroAdapter {
    fn vendor(&self) -> &str {
        VENDOR_NAME
    }

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn normalize_alert(&self, raw: &RawRecord) -> AdapterResult<Alert> {
        let alert_id = match raw.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let severity = raw
            .get("severity")
            .and_then(Value::as_str)
            .map(map_severity)
            .unwrap_or(Severity::Medium);
        let timestamp = raw
            .get("createdTime")
            .and_then(Value::as_str)
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let description = raw.get("description").and_then(Value::as_str);

        let entities = raw
            .get("entities")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|item| {
                let entity_type = item
                    .get("entityType")
                    .and_then(Value::as_str)
                    .and_then(map_entity_type)?;
                let value = item.get("entityValue").and_then(entity_value)?;
                Some(Entity::new(entity_type, value))
            });

        let alert = Alert::builder(alert_id, VENDOR_NAME, &self.tenant_id)
            .timestamp(timestamp)
            .severity(severity)
            .title(description.unwrap_or(DEFAULT_TITLE))
            .description(description.map(str::to_string))
            .entities(entities)
            .raw_data(raw.clone())
            .build()?;
        Ok(alert)
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn list_processes(&self, hostname: &str) -> AdapterResult<Vec<ProcessRecord>> {
        let Some(guid) = self
            .find_endpoint(hostname)
            .await?
            .and_then(|endpoint| endpoint.get("agentGuid").and_then(Value::as_str).map(str::to_string))
        else {
            debug!(hostname, "No Vision One endpoint matched");
            return Ok(Vec::new());
        };

        let telemetry = self.client.get_edr_telemetry(&guid, "process_list").await?;
        let rows = telemetry
            .get("data")
            .or_else(|| telemetry.get("items"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(rows.iter().filter_map(process_from_row).collect())
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn isolate_host(&self, hostname: &str) -> ToolResult {
        let started = Instant::now();
        let outcome = self
            .command(hostname, "isolate", Map::new())
            .await
            .map(|data| (data, format!("Isolation triggered for {}", hostname)));
        ToolResult::capture(started, outcome)
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn terminate_process(&self, hostname: &str, pid: u32) -> ToolResult {
        let started = Instant::now();
        let mut params = Map::new();
        params.insert("pid".into(), json!(pid));
        let outcome = self
            .command(hostname, "terminate_process", params)
            .await
            .map(|data| {
                (
                    data,
                    format!("Termination of process {} triggered on {}", pid, hostname),
                )
            });
        ToolResult::capture(started, outcome)
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    async fn get_host_details(&self, hostname: &str) -> AdapterResult<Value> {
        self.find_endpoint(hostname)
            .await?
            .ok_or_else(|| AdapterError::NotFound(format!("Host not found: {}", hostname)))
    }
}

fn process_from_row(row: &Value) -> Option<ProcessRecord> {
    let number = |key: &str| {
        row.get(key)
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
            .and_then(|n| u32::try_from(n).ok())
    };
    let text = |key: &str| row.get(key).and_then(Value::as_str).map(str::to_string);

    let mut process = ProcessRecord::new(number("processId")?);
    process.ppid = number("parentProcessId");
    process.name = text("processName");
    process.command_line = text("commandLine");
    process.executable_path = text("imagePath");
    process.username = text("user");
    Some(process)
}

/// OData filter matching one endpoint name. Quotes are doubled.
fn endpoint_filter(hostname: &str) -> String {
    format!("endpointName eq '{}'", hostname.replace('\'', "''"))
}
