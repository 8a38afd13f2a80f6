//! Composite skills: several adapter calls folded into one compact result.

use crate::registry::{ToolArguments, ToolArgumentsExt, ToolOutput, ToolRegistry};
use crate::schema::{ParameterDef, ParameterType};
use mdr_connectors::{transform_alert, AdapterResult, EndpointAdapter};
use mdr_core::{Alert, EntityType, ProcessRecord, RawRecord};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// Result of [`deep_investigate_host`].
#[derive(Debug, Clone, Serialize)]
pub struct HostInvestigation {
    pub hostname: String,
    pub host_info: Value,
    pub process_count: usize,
    pub suspicious_processes: Vec<ProcessRecord>,
    pub summary: String,
}

/// Result of [`triage_alert`].
#[derive(Debug, Clone, Serialize)]
pub struct TriageReport {
    pub normalized_alert: Alert,
    /// Host details keyed by hostname.
    pub enrichments: BTreeMap<String, Value>,
}

/// Collects host details and processes, flagging processes run from a
/// download directory.
#[instrument(skip(adapter), fields(vendor = adapter.vendor()))]
pub async fn deep_investigate_host(
    adapter: &dyn EndpointAdapter,
    hostname: &str,
) -> AdapterResult<HostInvestigation> {
    let host_info = adapter.get_host_details(hostname).await?;
    let processes = adapter.list_processes(hostname).await?;
    let process_count = processes.len();

    let suspicious_processes: Vec<ProcessRecord> = processes
        .into_iter()
        .filter(ProcessRecord::runs_from_downloads)
        .collect();

    let mut summary = format!(
        "Host {} has {} suspicious process(es) running.",
        hostname,
        suspicious_processes.len()
    );
    if !suspicious_processes.is_empty() {
        summary.push_str(" Review its network connections or isolate the host.");
    }
    info!(hostname, suspicious = suspicious_processes.len(), "Host investigated");

    Ok(HostInvestigation {
        hostname: hostname.to_string(),
        host_info,
        process_count,
        suspicious_processes,
        summary,
    })
}

/// Normalizes a raw alert and attaches host details for every HOST entity.
#[instrument(skip(adapter, raw), fields(vendor = adapter.vendor()))]
pub async fn triage_alert(adapter: &dyn EndpointAdapter, raw: &RawRecord) -> AdapterResult<TriageReport> {
    let normalized_alert = transform_alert(adapter, raw, None)?;

    let mut enrichments = BTreeMap::new();
    for hostname in normalized_alert.entity_values(EntityType::Host) {
        if !enrichments.contains_key(hostname) {
            let details = adapter.get_host_details(hostname).await?;
            enrichments.insert(hostname.to_string(), details);
        }
    }

    Ok(TriageReport {
        normalized_alert,
        enrichments,
    })
}

/// Registers `deep_investigate_host` and `triage_alert` bound to one adapter.
pub fn register_skill_tools(registry: &mut ToolRegistry, adapter: Arc<dyn EndpointAdapter>) {
    let bound = Arc::clone(&adapter);
    registry.register(
        "deep_investigate_host",
        "Investigate a host in one step: host details plus processes running from download directories.",
        vec![ParameterDef::required("hostname", "Target hostname", ParameterType::String)],
        move |args: ToolArguments| {
            let adapter = Arc::clone(&bound);
            async move {
                let hostname = args.require_str("hostname")?;
                ToolOutput::structured(&deep_investigate_host(adapter.as_ref(), hostname).await?)
            }
        },
    );

    registry.register(
        "triage_alert",
        "Normalize a raw vendor alert and enrich its hosts.",
        vec![ParameterDef::required("alert", "Raw vendor alert", ParameterType::Object)],
        move |args: ToolArguments| {
            let adapter = Arc::clone(&adapter);
            async move {
                let raw = args.require_object("alert")?;
                let report = triage_alert(adapter.as_ref(), raw).await?;
                ToolOutput::structured(&report)
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolError;
    use mdr_connectors::testing::as_record;
    use mdr_connectors::MockAdapter;
    use serde_json::json;

    #[tokio::test]
    async fn test_deep_investigate_flags_downloads() {
        let mock = MockAdapter::with_sample_data("t1");
        let result = deep_investigate_host(&mock, "workstation-001").await.unwrap();

        assert_eq!(result.process_count, 3);
        assert_eq!(result.suspicious_processes.len(), 1);
        assert_eq!(result.suspicious_processes[0].pid, 6620);
        assert!(result.summary.contains("1 suspicious"));
        assert!(result.summary.contains("isolate"));
        assert_eq!(result.host_info["ip_address"], "192.168.1.100");
    }

    #[tokio::test]
    async fn test_deep_investigate_clean_host() {
        let mock = MockAdapter::with_sample_data("t1");
        let result = deep_investigate_host(&mock, "server-001").await.unwrap();
        assert!(result.suspicious_processes.is_empty());
        assert_eq!(result.summary, "Host server-001 has 0 suspicious process(es) running.");
    }

    #[tokio::test]
    async fn test_triage_enriches_hosts() {
        let mock = MockAdapter::with_sample_data("t1");
        let raw = as_record(json!({
            "id": "m-7",
            "title": "Dropper executed",
            "severity": "critical",
            "hostname": "workstation-001",
            "links": {"self": "http://mock/m-7"}
        }));

        let report = triage_alert(&mock, &raw).await.unwrap();
        assert_eq!(report.normalized_alert.alert_id, "m-7");
        assert!(!report.normalized_alert.raw_data.contains_key("links"));
        assert_eq!(report.enrichments["workstation-001"]["os"], "Windows 10 Enterprise 21H2");
    }

    #[tokio::test]
    async fn test_skill_tools() {
        let mut registry = ToolRegistry::new();
        register_skill_tools(&mut registry, Arc::new(MockAdapter::with_sample_data("t1")));

        let output = registry
            .execute(
                "deep_investigate_host",
                as_record(json!({"hostname": "workstation-001"})),
            )
            .await
            .unwrap();
        assert!(output.render().contains("invoice.exe"));

        let err = registry
            .execute("triage_alert", as_record(json!({"alert": "not an object"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
