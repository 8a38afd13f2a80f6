//! Tenant-aware tools that obtain a fresh adapter from the factory per call.

use crate::registry::{ToolArguments, ToolArgumentsExt, ToolError, ToolOutput, ToolRegistry};
use crate::schema::{ParameterDef, ParameterType};
use crate::skills::{deep_investigate_host, triage_alert};
use mdr_connectors::{AdapterFactory, EndpointAdapter, PackConfig};
use std::sync::Arc;
use tracing::debug;

fn tenant_parameters() -> Vec<ParameterDef> {
    vec![
        ParameterDef::required("tenant_id", "Tenant identifier", ParameterType::String),
        ParameterDef::required("vendor", "Vendor pack id (e.g. fidelis, trendmicro)", ParameterType::String),
        ParameterDef::required("config", "Vendor pack configuration", ParameterType::Object),
    ]
}

fn with_tenant_parameters(extra: ParameterDef) -> Vec<ParameterDef> {
    let mut parameters = tenant_parameters();
    parameters.push(extra);
    parameters
}

fn hostname_parameter() -> ParameterDef {
    ParameterDef::required("hostname", "Target hostname", ParameterType::String)
}

/// Resolves the adapter named by the `tenant_id`, `vendor` and `config` arguments.
fn adapter_for(
    factory: &AdapterFactory,
    args: &ToolArguments,
) -> Result<Arc<dyn EndpointAdapter>, ToolError> {
    let tenant_id = args.require_str("tenant_id")?;
    let vendor = args.require_str("vendor")?.to_ascii_lowercase();
    let config: PackConfig = args
        .require_object("config")?
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    debug!(tenant_id, vendor = %vendor, "Resolving adapter for tool call");
    Ok(factory.get(&vendor, tenant_id, &config)?)
}

/// Registers `investigate_host`, `triage_tenant_alert`, `isolate_endpoint`,
/// `unisolate_endpoint` and `list_endpoint_processes`.
///
/// Names are disjoint from [`crate::register_skill_tools`], so both sets can
/// share one registry.
pub fn register_standard_tools(registry: &mut ToolRegistry, factory: Arc<AdapterFactory>) {
    let f = Arc::clone(&factory);
    registry.register(
        "investigate_host",
        "Investigate a host in depth: inventory record and suspicious processes.",
        with_tenant_parameters(hostname_parameter()),
        move |args: ToolArguments| {
            let factory = Arc::clone(&f);
            async move {
                let adapter = adapter_for(&factory, &args)?;
                let hostname = args.require_str("hostname")?;
                ToolOutput::structured(&deep_investigate_host(adapter.as_ref(), hostname).await?)
            }
        },
    );

    let f = Arc::clone(&factory);
    registry.register(
        "triage_tenant_alert",
        "Normalize a raw vendor alert and enrich its hosts with inventory details.",
        with_tenant_parameters(ParameterDef::required(
            "alert",
            "Raw vendor alert",
            ParameterType::Object,
        )),
        move |args: ToolArguments| {
            let factory = Arc::clone(&f);
            async move {
                let adapter = adapter_for(&factory, &args)?;
                let raw = args.require_object("alert")?;
                ToolOutput::structured(&triage_alert(adapter.as_ref(), raw).await?)
            }
        },
    );

    let f = Arc::clone(&factory);
    registry.register(
        "isolate_endpoint",
        "Network-isolate a compromised host to stop the threat from spreading.",
        with_tenant_parameters(hostname_parameter()),
        move |args: ToolArguments| {
            let factory = Arc::clone(&f);
            async move {
                let adapter = adapter_for(&factory, &args)?;
                let hostname = args.require_str("hostname")?;
                ToolOutput::structured(&adapter.isolate_host(hostname).await)
            }
        },
    );

    let f = Arc::clone(&factory);
    registry.register(
        "unisolate_endpoint",
        "Release an isolated host and restore its network connectivity.",
        with_tenant_parameters(hostname_parameter()),
        move |args: ToolArguments| {
            let factory = Arc::clone(&f);
            async move {
                let adapter = adapter_for(&factory, &args)?;
                let hostname = args.require_str("hostname")?;
                ToolOutput::structured(&adapter.unisolate_host(hostname).await)
            }
        },
    );

    registry.register(
        "list_endpoint_processes",
        "List the normalized processes currently running on a host.",
        with_tenant_parameters(hostname_parameter()),
        move |args: ToolArguments| {
            let factory = Arc::clone(&factory);
            async move {
                let adapter = adapter_for(&factory, &args)?;
                let hostname = args.require_str("hostname")?;
                ToolOutput::structured(&adapter.list_processes(hostname).await?)
            }
        },
    );
}
