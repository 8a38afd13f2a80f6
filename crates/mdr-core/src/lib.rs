//! # mdr-core
//!
//! Canonical data model for the MDR orchestrator.
//!
//! Every vendor pack normalizes its payloads into the types defined here, so
//! everything above the connector layer works against one vendor-independent
//! representation of alerts, processes and action results.

pub mod alert;
pub mod process;
pub mod tool_result;

pub use alert::{
    Alert, AlertBuilder, Entity, EntityType, MitreAttack, RawRecord, Severity, ValidationError,
};
pub use process::ProcessRecord;
pub use tool_result::{ToolResult, ToolStatus};
