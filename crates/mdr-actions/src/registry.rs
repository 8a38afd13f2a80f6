//! Tool registry for the investigation loop.
//!
//! Tools are registered once at startup and the registry is then shared
//! read-only (`Arc<ToolRegistry>`). Enumeration follows registration order.

use crate::schema::{CapabilitySignature, ParameterDef, ToolSchema};
use async_trait::async_trait;
use mdr_connectors::{AdapterError, PackError};
use mdr_observability::MetricsCollector;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors that can occur during tool execution.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Pack(#[from] PackError),
}

/// Keyword arguments passed to a tool.
pub type ToolArguments = Map<String, Value>;

/// Value returned by a tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Structured(Value),
    Text(String),
}

impl ToolOutput {
    /// Serializes structured output as compact JSON; text is returned as-is.
    pub fn render(&self) -> String {
        match self {
            Self::Structured(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }

    /// Wraps any serializable value as structured output.
    pub fn structured<T: serde::Serialize>(value: &T) -> Result<Self, ToolError> {
        serde_json::to_value(value)
            .map(Self::Structured)
            .map_err(|e| ToolError::Execution(format!("unserializable tool output: {}", e)))
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Bound callable behind a tool.
///
/// Implemented for async closures taking [`ToolArguments`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: ToolArguments) -> Result<ToolOutput, ToolError>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
{
    async fn call(&self, arguments: ToolArguments) -> Result<ToolOutput, ToolError> {
        (self)(arguments).await
    }
}

/// Typed accessors over [`ToolArguments`].
pub trait ToolArgumentsExt {
    fn get_str(&self, key: &str) -> Option<&str>;

    fn require_str(&self, key: &str) -> Result<&str, ToolError>;

    /// Requires a non-negative integer that fits in `u32`. Numeric strings are accepted.
    fn require_u32(&self, key: &str) -> Result<u32, ToolError>;

    fn require_object(&self, key: &str) -> Result<&Map<String, Value>, ToolError>;
}

impl ToolArgumentsExt for ToolArguments {
    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn require_str(&self, key: &str) -> Result<&str, ToolError> {
        self.get_str(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments(format!("Missing required parameter: {}", key)))
    }

    fn require_u32(&self, key: &str) -> Result<u32, ToolError> {
        let value = self
            .get(key)
            .ok_or_else(|| ToolError::InvalidArguments(format!("Missing required parameter: {}", key)))?;
        let number = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        number
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| ToolError::InvalidArguments(format!("'{}' must be a non-negative integer", key)))
    }

    fn require_object(&self, key: &str) -> Result<&Map<String, Value>, ToolError> {
        self.get(key)
            .and_then(Value::as_object)
            .ok_or_else(|| ToolError::InvalidArguments(format!("'{}' must be an object", key)))
    }
}

struct RegisteredTool {
    schema: ToolSchema,
    handler: Arc<dyn ToolHandler>,
}

/// Registry of callable tools.
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, RegisteredTool>,
    metrics: MetricsCollector,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            tools: HashMap::new(),
            metrics: MetricsCollector::new(),
        }
    }

    /// Registers a tool.
    ///
    /// Registering a name that already exists replaces the earlier tool (last
    /// writer wins); the name keeps its original position in
    /// [`list_schemas`](Self::list_schemas).
    pub fn register<H>(
        &mut self,
        name: &str,
        description: &str,
        parameters: Vec<ParameterDef>,
        handler: H,
    ) where
        H: ToolHandler + 'static,
    {
        self.insert(ToolSchema::new(name, description, parameters), Arc::new(handler));
    }

    /// Registers a tool whose schema is derived from a capability signature.
    pub fn register_signature<H>(&mut self, signature: &CapabilitySignature, handler: H)
    where
        H: ToolHandler + 'static,
    {
        self.insert(signature.to_schema(), Arc::new(handler));
    }

    fn insert(&mut self, schema: ToolSchema, handler: Arc<dyn ToolHandler>) {
        let name = schema.name.clone();
        if self.tools.contains_key(&name) {
            warn!("Replacing registered tool: {}", name);
        } else {
            info!("Registering tool: {}", name);
            self.order.push(name.clone());
        }
        self.tools.insert(name, RegisteredTool { schema, handler });
    }

    /// Schemas of all tools, in registration order.
    pub fn list_schemas(&self) -> Vec<&ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| &tool.schema)
            .collect()
    }

    /// Schema of one tool.
    pub fn get(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.get(name).map(|tool| &tool.schema)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Executes a tool with keyword arguments.
    ///
    /// The handler's result is returned unmodified, including its errors.
    #[instrument(skip(self, arguments))]
    pub async fn execute(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let started = Instant::now();
        let result = tool.handler.call(arguments).await;
        let elapsed = started.elapsed().as_secs_f64();

        self.metrics
            .record_tool_execution(name, result.is_ok(), elapsed);
        match &result {
            Ok(_) => debug!(duration_secs = elapsed, "Tool completed"),
            Err(e) => warn!(duration_secs = elapsed, error = %e, "Tool failed"),
        }
        result
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParameterType;
    use serde_json::json;

    fn args(value: Value) -> ToolArguments {
        match value {
            Value::Object(map) => map,
            _ => panic!("arguments must be an object"),
        }
    }

    async fn echo(arguments: ToolArguments) -> Result<ToolOutput, ToolError> {
        let target = arguments.require_str("target")?;
        Ok(ToolOutput::Text(format!("Executed on {}", target)))
    }

    #[tokio::test]
    async fn test_registry_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(
            "echo",
            "Echoes the target",
            vec![ParameterDef::required("target", "The target", ParameterType::String)],
            echo,
        );

        let output = registry
            .execute("echo", args(json!({"target": "PC-01"})))
            .await
            .unwrap();
        assert_eq!(output, ToolOutput::Text("Executed on PC-01".into()));
    }

    #[tokio::test]
    async fn test_missing_parameter_propagates() {
        let mut registry = ToolRegistry::new();
        registry.register("echo", "", vec![], echo);

        let err = registry.execute("echo", ToolArguments::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(err.to_string(), "Invalid arguments: Missing required parameter: target");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nope", ToolArguments::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_reregistration_overwrites_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register("first", "v1", vec![], |_args: ToolArguments| async {
            Ok(ToolOutput::Text("v1".into()))
        });
        registry.register("second", "", vec![], |_args: ToolArguments| async {
            Ok(ToolOutput::Text("second".into()))
        });
        registry.register("first", "v2", vec![], |_args: ToolArguments| async {
            Ok(ToolOutput::Text("v2".into()))
        });

        assert_eq!(registry.names(), vec!["first", "second"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("first").unwrap().description, "v2");
        let output = registry.execute("first", ToolArguments::new()).await.unwrap();
        assert_eq!(output.render(), "v2");
    }

    #[test]
    fn test_schemas_in_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(name, "", vec![], echo);
        }

        let names: Vec<&str> = registry
            .list_schemas()
            .iter()
            .map(|schema| schema.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_render() {
        assert_eq!(ToolOutput::Structured(json!({"a": 1})).render(), r#"{"a":1}"#);
        assert_eq!(ToolOutput::Text("plain".into()).render(), "plain");
    }

    #[test]
    fn test_argument_accessors() {
        let arguments = args(json!({"pid": "4242", "neg": -1, "config": {"k": "v"}, "name": ""}));
        assert_eq!(arguments.require_u32("pid").unwrap(), 4242);
        assert!(arguments.require_u32("neg").is_err());
        assert!(arguments.require_u32("absent").is_err());
        assert_eq!(arguments.require_object("config").unwrap()["k"], "v");
        assert!(arguments.require_str("name").is_err());
    }
}
