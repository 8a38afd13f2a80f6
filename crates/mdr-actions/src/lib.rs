//! # mdr-actions
//!
//! Callable tools for the investigation loop.
//!
//! The [`ToolRegistry`] maps tool names to schema-described handlers. Tools
//! come from adapter capabilities ([`register_adapter_tools`]), from composite
//! skills ([`skills`]) and from the tenant-aware standard tool set
//! ([`register_standard_tools`]).

pub mod adapter_tools;
pub mod registry;
pub mod schema;
pub mod skills;
pub mod standard_tools;

pub use adapter_tools::{adapter_signatures, register_adapter_tools};
pub use registry::{
    ToolArguments, ToolArgumentsExt, ToolError, ToolHandler, ToolOutput, ToolRegistry,
};
pub use schema::{CapabilitySignature, ParamSpec, ParameterDef, ParameterType, ToolSchema};
pub use skills::{
    deep_investigate_host, register_skill_tools, triage_alert, HostInvestigation, TriageReport,
};
pub use standard_tools::register_standard_tools;
