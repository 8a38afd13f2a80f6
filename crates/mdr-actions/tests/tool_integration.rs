//! Tools wired against real packs with canned vendor clients.

use mdr_actions::{
    register_adapter_tools, register_skill_tools, register_standard_tools, ToolError, ToolOutput,
    ToolRegistry,
};
use mdr_connectors::edr::fidelis::FidelisAdapter;
use mdr_connectors::testing::{as_record, StubFidelisApi};
use mdr_connectors::{AdapterFactory, PackConfig, PackError, PackRegistry};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

fn fidelis_tools(stub: Arc<StubFidelisApi>) -> ToolRegistry {
    let mut config = PackConfig::new();
    config.insert("fidelis_isolate_script_id".into(), json!("script-iso"));
    let adapter = Arc::new(FidelisAdapter::with_client("tenant-a", config, stub));

    let mut registry = ToolRegistry::new();
    register_adapter_tools(&mut registry, adapter);
    registry
}

#[tokio::test]
async fn test_fidelis_capabilities_as_tools() {
    let stub = Arc::new(StubFidelisApi::default());
    let registry = fidelis_tools(Arc::clone(&stub));

    let output = registry
        .execute("list_processes", as_record(json!({"hostname": "PC-01"})))
        .await
        .unwrap();
    let ToolOutput::Structured(Value::Array(processes)) = output else {
        panic!("expected a process list");
    };
    assert_eq!(processes.len(), 2);

    let output = registry
        .execute("isolate_host", as_record(json!({"hostname": "PC-01"})))
        .await
        .unwrap();
    let ToolOutput::Structured(result) = output else {
        panic!("expected a tool result");
    };
    assert_eq!(result["status"], "success");
    assert_eq!(stub.scripts_run().len(), 1);
}

#[test]
fn test_every_name_listed_once() {
    let mut registry = fidelis_tools(Arc::new(StubFidelisApi::default()));
    let factory = Arc::new(AdapterFactory::new(Arc::new(PackRegistry::bundled())));
    register_standard_tools(&mut registry, factory);
    register_skill_tools(
        &mut registry,
        Arc::new(FidelisAdapter::with_client(
            "tenant-a",
            PackConfig::new(),
            Arc::new(StubFidelisApi::default()),
        )),
    );
    register_adapter_tools(
        &mut registry,
        Arc::new(FidelisAdapter::with_client(
            "tenant-b",
            PackConfig::new(),
            Arc::new(StubFidelisApi::default()),
        )),
    );

    let names: Vec<&str> = registry.list_schemas().iter().map(|s| s.name.as_str()).collect();
    let unique: HashSet<&str> = names.iter().copied().collect();
    assert_eq!(names.len(), unique.len());
    assert_eq!(names.len(), 11);
    assert!(names.contains(&"triage_alert"));
    assert!(names.contains(&"triage_tenant_alert"));
    assert_eq!(names[0], "list_processes");
    assert_eq!(names[4], "investigate_host");
}

#[tokio::test]
async fn test_standard_tool_rejects_incomplete_config() {
    let mut registry = ToolRegistry::new();
    let factory = Arc::new(AdapterFactory::new(Arc::new(PackRegistry::bundled())));
    register_standard_tools(&mut registry, factory);

    let err = registry
        .execute(
            "isolate_endpoint",
            as_record(json!({
                "tenant_id": "tenant-a",
                "vendor": "fidelis",
                "config": {"server_url": "https://fidelis.local"},
                "hostname": "PC-01"
            })),
        )
        .await
        .unwrap_err();

    match err {
        ToolError::Pack(PackError::ConfigValidation { missing, .. }) => {
            assert_eq!(missing, vec!["username", "password"]);
        }
        other => panic!("unexpected error: {}", other),
    }
}
