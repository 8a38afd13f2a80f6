//! Exposes one adapter's capabilities as tools.

use crate::registry::{ToolArguments, ToolArgumentsExt, ToolOutput, ToolRegistry};
use crate::schema::{CapabilitySignature, ParameterType};
use mdr_connectors::EndpointAdapter;
use std::sync::Arc;

/// Signatures of the adapter capabilities exposed as tools.
pub fn adapter_signatures() -> Vec<CapabilitySignature> {
    vec![
        CapabilitySignature::new(
            "list_processes",
            "List the processes currently running on a host.",
        )
        .param("hostname", Some(ParameterType::String)),
        CapabilitySignature::new(
            "isolate_host",
            "Network-isolate a host to contain a threat.",
        )
        .param("hostname", Some(ParameterType::String)),
        CapabilitySignature::new(
            "terminate_process",
            "Terminate a process on a host by pid.",
        )
        .param("hostname", Some(ParameterType::String))
        .param("pid", Some(ParameterType::Integer)),
        CapabilitySignature::new(
            "get_host_details",
            "Fetch the vendor's inventory record for a host.",
        )
        .param("hostname", Some(ParameterType::String)),
    ]
}

/// Registers `list_processes`, `isolate_host`, `terminate_process` and
/// `get_host_details` bound to `adapter`.
pub fn register_adapter_tools(registry: &mut ToolRegistry, adapter: Arc<dyn EndpointAdapter>) {
    for signature in adapter_signatures() {
        let adapter = Arc::clone(&adapter);
        let tool = signature.name.clone();
        registry.register_signature(&signature, move |args: ToolArguments| {
            let adapter = Arc::clone(&adapter);
            let tool = tool.clone();
            async move { call_capability(adapter.as_ref(), &tool, args).await }
        });
    }
}

async fn call_capability(
    adapter: &dyn EndpointAdapter,
    tool: &str,
    args: ToolArguments,
) -> Result<ToolOutput, crate::ToolError> {
    let hostname = args.require_str("hostname")?;
    match tool {
        "list_processes" => ToolOutput::structured(&adapter.list_processes(hostname).await?),
        "isolate_host" => ToolOutput::structured(&adapter.isolate_host(hostname).await),
        "terminate_process" => {
            let pid = args.require_u32("pid")?;
            ToolOutput::structured(&adapter.terminate_process(hostname, pid).await)
        }
        "get_host_details" => Ok(ToolOutput::Structured(
            adapter.get_host_details(hostname).await?,
        )),
        other => Err(crate::ToolError::NotFound(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolError;
    use mdr_connectors::{MockAdapter, MockBehavior};
    use serde_json::{json, Value};

    fn args(value: Value) -> ToolArguments {
        value.as_object().cloned().unwrap_or_default()
    }

    fn registry_with(mock: Arc<MockAdapter>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register_adapter_tools(&mut registry, mock);
        registry
    }

    #[test]
    fn test_registers_four_capabilities() {
        let registry = registry_with(Arc::new(MockAdapter::new("t1")));
        assert_eq!(
            registry.names(),
            vec!["list_processes", "isolate_host", "terminate_process", "get_host_details"]
        );

        let schema = registry.get("terminate_process").unwrap().parameters_json();
        assert_eq!(schema["properties"]["pid"]["type"], "integer");
        assert_eq!(schema["required"], json!(["hostname", "pid"]));
    }

    #[tokio::test]
    async fn test_list_processes_tool() {
        let registry = registry_with(Arc::new(MockAdapter::with_sample_data("t1")));

        let output = registry
            .execute("list_processes", args(json!({"hostname": "workstation-001"})))
            .await
            .unwrap();
        match output {
            ToolOutput::Structured(Value::Array(processes)) => {
                assert_eq!(processes.len(), 3);
                assert_eq!(processes[2]["name"], "invoice.exe");
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_response_action_failure_is_data() {
        let mock = Arc::new(MockAdapter::with_sample_data("t1"));
        mock.set_behavior(MockBehavior::AlwaysFail("vendor down".into()))
            .await;
        let registry = registry_with(Arc::clone(&mock));

        let output = registry
            .execute("isolate_host", args(json!({"hostname": "workstation-001"})))
            .await
            .unwrap();
        let rendered = output.render();
        assert!(rendered.contains("\"status\":\"error\""));
        assert!(rendered.contains("vendor down"));
    }

    #[tokio::test]
    async fn test_read_failure_propagates() {
        let registry = registry_with(Arc::new(MockAdapter::with_sample_data("t1")));

        let err = registry
            .execute("get_host_details", args(json!({"hostname": "ghost"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Adapter(_)));

        let err = registry
            .execute("terminate_process", args(json!({"hostname": "workstation-001"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
