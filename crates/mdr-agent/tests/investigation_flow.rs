//! End-to-end investigations over a real pack with a canned vendor client.

use mdr_actions::{register_adapter_tools, register_skill_tools, ToolRegistry};
use mdr_agent::{
    BackendReply, InvestigationEngine, InvestigationState, PlaybookLoader, Role, ScriptedBackend,
    ToolCallRequest,
};
use mdr_connectors::edr::fidelis::FidelisAdapter;
use mdr_connectors::testing::{sample_fidelis_alert, StubFidelisApi};
use mdr_connectors::{transform_alert, EndpointAdapter, PackConfig};
use serde_json::{json, Value};
use std::sync::Arc;

fn fidelis(stub: Arc<StubFidelisApi>) -> Arc<dyn EndpointAdapter> {
    let mut config = PackConfig::new();
    config.insert("fidelis_isolate_script_id".into(), json!("script-iso"));
    Arc::new(FidelisAdapter::with_client("tenant-a", config, stub))
}

fn registry(adapter: Arc<dyn EndpointAdapter>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_adapter_tools(&mut registry, Arc::clone(&adapter));
    register_skill_tools(&mut registry, adapter);
    registry
}

#[tokio::test]
async fn test_investigation_runs_vendor_tools() {
    let stub = Arc::new(StubFidelisApi::default());
    let adapter = fidelis(Arc::clone(&stub));
    let alert = transform_alert(adapter.as_ref(), &sample_fidelis_alert(), None).unwrap();
    let registry = registry(adapter);

    let backend = Arc::new(ScriptedBackend::new(vec![
        BackendReply::tool_calls(vec![ToolCallRequest::new(
            "call_1",
            "deep_investigate_host",
            r#"{"hostname":"PC-01"}"#,
        )]),
        BackendReply::tool_calls(vec![ToolCallRequest::new(
            "call_2",
            "isolate_host",
            r#"{"hostname":"PC-01"}"#,
        )]),
        BackendReply::text("invoice.exe ran from Downloads; PC-01 was isolated."),
    ]));
    let prompt = PlaybookLoader::bundled()
        .get("detailed_host_investigation")
        .unwrap();
    let engine = InvestigationEngine::new(backend.clone(), prompt);

    let investigation = engine.investigate(&alert, &registry).await.unwrap();

    assert_eq!(backend.call_count(), 3);
    assert_eq!(investigation.state(), InvestigationState::Done);
    assert_eq!(
        investigation.conclusion(),
        "invoice.exe ran from Downloads; PC-01 was isolated."
    );

    let tool_replies: Vec<_> = investigation
        .history()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_replies.len(), 2);

    let report: Value = serde_json::from_str(tool_replies[0].text()).unwrap();
    assert_eq!(report["hostname"], "PC-01");
    assert_eq!(report["suspicious_processes"][0]["pid"], 4242);

    let isolation: Value = serde_json::from_str(tool_replies[1].text()).unwrap();
    assert_eq!(isolation["status"], "success");
    assert_eq!(stub.scripts_run()[0].1, "192.168.1.10");

    // the first request carried the normalized alert
    let first = &backend.requests()[0];
    assert!(first[0].text().starts_with("# Playbook:"));
    assert!(first[1].text().contains("PC-01"));
    assert!(!first[1].text().contains("http://api/1001"));
}

#[tokio::test]
async fn test_text_only_backend_concludes_after_one_call() {
    let adapter = fidelis(Arc::new(StubFidelisApi::default()));
    let alert = transform_alert(adapter.as_ref(), &sample_fidelis_alert(), None).unwrap();
    let registry = registry(adapter);

    let backend = Arc::new(ScriptedBackend::repeating(BackendReply::text(
        "Likely true positive; isolate PC-01.",
    )));
    let investigation = InvestigationEngine::new(backend.clone(), "You are an analyst.")
        .investigate(&alert, &registry)
        .await
        .unwrap();

    assert_eq!(backend.call_count(), 1);
    assert_eq!(backend.tool_counts(), vec![registry.len()]);
    assert_eq!(investigation.history().len(), 3);
    assert_eq!(
        investigation.conclusion(),
        "Likely true positive; isolate PC-01."
    );
}

#[tokio::test]
async fn test_vendor_failure_does_not_abort() {
    let adapter = fidelis(Arc::new(StubFidelisApi::default()));
    let alert = transform_alert(adapter.as_ref(), &sample_fidelis_alert(), None).unwrap();
    let registry = registry(adapter);

    let backend = Arc::new(ScriptedBackend::new(vec![
        BackendReply::tool_calls(vec![ToolCallRequest::new(
            "call_1",
            "get_host_details",
            r#"{"hostname":"UNKNOWN-HOST"}"#,
        )]),
        BackendReply::text("Host not found in EDR."),
    ]));
    let investigation = InvestigationEngine::new(backend, "You are an analyst.")
        .investigate(&alert, &registry)
        .await
        .unwrap();

    let reply = &investigation.history()[3];
    assert_eq!(reply.role, Role::Tool);
    assert!(reply.text().starts_with("Error: "));
    assert!(investigation.is_complete());
}
