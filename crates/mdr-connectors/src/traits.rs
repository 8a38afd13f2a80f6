//! Capability contract shared by every vendor pack.

use crate::normalize::{EventCategory, DEFAULT_EXCLUDED_KEYS};
use async_trait::async_trait;
use mdr_core::{Alert, ProcessRecord, RawRecord, ToolResult, ValidationError};
use std::time::Instant;
use thiserror::Error;

/// Errors that can occur while talking to a vendor or mapping its payloads.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Vendor operation failed: {0}")]
    VendorOperation(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed alert payload: {0}")]
    MalformedAlert(String),

    #[error("Alert validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Operations every vendor adapter provides.
///
/// An adapter is bound to one tenant at construction. Read operations
/// (`normalize_alert`, `list_processes`, `get_host_details`) return `Err` on
/// failure; response actions (`isolate_host`, `unisolate_host`,
/// `terminate_process`) never do and report failures through [`ToolResult`]
/// instead.
///
/// `unisolate_host` is optional. Packs that cannot release a host keep the
/// default, which reports the gap as an error result.
///
/// Alerts should be produced through [`crate::pipeline::transform_alert`], which
/// wraps `normalize_alert` with cleaning, optimization and validation.
#[async_trait]
pub trait EndpointAdapter: Send + Sync {
    /// Vendor display name stamped on normalized alerts.
    fn vendor(&self) -> &str;

    /// Tenant this adapter instance serves.
    fn tenant_id(&self) -> &str;

    /// Keys stripped from raw payloads before mapping.
    fn excluded_keys(&self) -> &[&str] {
        DEFAULT_EXCLUDED_KEYS
    }

    /// Event category derived from the raw payload, if the vendor reports one.
    fn event_category(&self, _raw: &RawRecord) -> Option<EventCategory> {
        None
    }

    /// Maps one cleaned vendor record into a canonical alert.
    fn normalize_alert(&self, raw: &RawRecord) -> AdapterResult<Alert>;

    /// Lists processes running on a host.
    async fn list_processes(&self, hostname: &str) -> AdapterResult<Vec<ProcessRecord>>;

    /// Network-isolates a host.
    async fn isolate_host(&self, hostname: &str) -> ToolResult;

    /// Restores network connectivity of an isolated host.
    async fn unisolate_host(&self, _hostname: &str) -> ToolResult {
        ToolResult::error(
            format!("Vendor {} does not support unisolate operation", self.vendor()),
            Instant::now(),
        )
    }

    /// Terminates a process on a host.
    async fn terminate_process(&self, hostname: &str, pid: u32) -> ToolResult;

    /// Returns the vendor's view of a host.
    async fn get_host_details(&self, hostname: &str) -> AdapterResult<serde_json::Value>;
}
