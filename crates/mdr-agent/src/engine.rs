//! Bounded investigation loop.
//!
//! One investigation is a strictly sequential exchange: the backend is asked
//! for a turn, requested tools run one after another through the registry,
//! their results are appended to the history and the backend is asked again,
//! until it answers without tool calls or the iteration budget runs out.

use crate::backend::{BackendError, ReasoningBackend};
use crate::message::{ChatMessage, ToolCallRequest};
use mdr_actions::{ToolArguments, ToolRegistry};
use mdr_core::Alert;
use mdr_observability::{investigation_span, tool_span, MetricsCollector};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Default number of backend turns per investigation.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Conclusion used when the final reply carries no text.
pub const EMPTY_SUMMARY_PLACEHOLDER: &str = "Investigation completed without a summary.";

/// Conclusion used when the iteration budget runs out.
pub const BUDGET_EXHAUSTED_MESSAGE: &str =
    "Maximum iterations reached; investigation stopped. Review the conversation history.";

/// System prompt used when neither a prompt nor a playbook is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an MDR security analyst. Analyze the alert, \
use the available tools to gather evidence about the affected hosts, and conclude with the \
likely root cause and recommended response actions.";

/// Engine errors. Tool failures never surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Backend failure: {0}")]
    Backend(#[from] BackendError),

    #[error("Failed to serialize alert: {0}")]
    Serialization(String),
}

/// Where an investigation stands.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationState {
    AwaitingModelTurn,
    ExecutingTools,
    Done,
    BudgetExhausted,
}

impl InvestigationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingModelTurn => "awaiting_model_turn",
            Self::ExecutingTools => "executing_tools",
            Self::Done => "done",
            Self::BudgetExhausted => "budget_exhausted",
        }
    }
}

/// Outcome of one investigation. The history is append-only.
#[derive(Debug, Clone, Serialize)]
pub struct Investigation {
    id: Uuid,
    alert_id: String,
    history: Vec<ChatMessage>,
    iterations: usize,
    state: InvestigationState,
    conclusion: String,
}

impl Investigation {
    fn start(alert_id: &str, system_prompt: &str, user_message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_id: alert_id.to_string(),
            history: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_message),
            ],
            iterations: 0,
            state: InvestigationState::AwaitingModelTurn,
            conclusion: String::new(),
        }
    }

    fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    fn finish(&mut self, state: InvestigationState, conclusion: String) {
        self.state = state;
        self.conclusion = conclusion;
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn alert_id(&self) -> &str {
        &self.alert_id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Number of backend turns taken.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn state(&self) -> InvestigationState {
        self.state
    }

    /// The final answer, the placeholder, or the budget message.
    pub fn conclusion(&self) -> &str {
        &self.conclusion
    }

    pub fn is_complete(&self) -> bool {
        self.state == InvestigationState::Done
    }
}

/// Drives investigations against one reasoning backend.
pub struct InvestigationEngine {
    backend: Arc<dyn ReasoningBackend>,
    system_prompt: String,
    max_iterations: usize,
    metrics: MetricsCollector,
}

impl InvestigationEngine {
    pub fn new(backend: Arc<dyn ReasoningBackend>, system_prompt: impl Into<String>) -> Self {
        Self {
            backend,
            system_prompt: system_prompt.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Investigates an alert with the engine's iteration budget.
    pub async fn investigate(
        &self,
        alert: &Alert,
        registry: &ToolRegistry,
    ) -> Result<Investigation, EngineError> {
        self.investigate_with_limit(alert, registry, self.max_iterations)
            .await
    }

    /// Investigates an alert, taking at most `max_iterations` backend turns.
    pub async fn investigate_with_limit(
        &self,
        alert: &Alert,
        registry: &ToolRegistry,
        max_iterations: usize,
    ) -> Result<Investigation, EngineError> {
        let alert_json = serde_json::to_string_pretty(alert)
            .map_err(|e| EngineError::Serialization(e.to_string()))?;
        let user_message = format!(
            "A new security alert was detected. Investigate its root cause and recommend a response:\n\n{}",
            alert_json
        );
        let investigation = Investigation::start(&alert.alert_id, &self.system_prompt, user_message);
        let span = investigation_span!(investigation.id, alert.alert_id);

        self.run(investigation, registry, max_iterations)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        mut investigation: Investigation,
        registry: &ToolRegistry,
        max_iterations: usize,
    ) -> Result<Investigation, EngineError> {
        info!(
            backend = self.backend.name(),
            max_iterations,
            "Starting investigation"
        );
        let tools = registry.list_schemas();

        while investigation.iterations < max_iterations {
            investigation.iterations += 1;
            investigation.state = InvestigationState::AwaitingModelTurn;
            debug!(iteration = investigation.iterations, "Requesting model turn");

            let started = Instant::now();
            let outcome = self.backend.chat(&investigation.history, &tools).await;
            self.metrics
                .record_backend_call(self.backend.name(), started.elapsed().as_secs_f64());
            let reply = match outcome {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "Backend call failed");
                    self.metrics
                        .record_investigation("backend_error", investigation.iterations);
                    return Err(e.into());
                }
            };

            investigation.push(ChatMessage::assistant(
                reply.content.clone(),
                reply.tool_calls.clone(),
            ));

            if !reply.has_tool_calls() {
                let conclusion = reply
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| EMPTY_SUMMARY_PLACEHOLDER.to_string());
                investigation.finish(InvestigationState::Done, conclusion);
                info!(
                    iterations = investigation.iterations,
                    "Investigation completed"
                );
                self.metrics
                    .record_investigation("done", investigation.iterations);
                return Ok(investigation);
            }

            investigation.state = InvestigationState::ExecutingTools;
            for call in &reply.tool_calls {
                let span = tool_span!(call.name(), call.id);
                let content = execute_call(registry, call).instrument(span).await;
                investigation.push(ChatMessage::tool(&call.id, call.name(), content));
            }
        }

        warn!(
            iterations = investigation.iterations,
            "Iteration budget exhausted"
        );
        investigation.finish(
            InvestigationState::BudgetExhausted,
            BUDGET_EXHAUSTED_MESSAGE.to_string(),
        );
        self.metrics
            .record_investigation("budget_exhausted", investigation.iterations);
        Ok(investigation)
    }
}

/// Runs one requested tool and renders the reply text.
async fn execute_call(registry: &ToolRegistry, call: &ToolCallRequest) -> String {
    let arguments = match decode_arguments(call.arguments()) {
        Ok(arguments) => arguments,
        Err(message) => {
            warn!(error = %message, "Undecodable tool arguments");
            return format!("Error: {}", message);
        }
    };

    info!("Executing tool");
    match registry.execute(call.name(), arguments).await {
        Ok(output) => output.render(),
        Err(e) => format!("Error: {}", e),
    }
}

/// Decodes model-produced arguments into keyword arguments.
///
/// A blank string means no arguments.
fn decode_arguments(raw: &str) -> Result<ToolArguments, String> {
    if raw.trim().is_empty() {
        return Ok(ToolArguments::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!(
            "tool arguments must be a JSON object, got {}",
            json_kind(&other)
        )),
        Err(e) => Err(format!("invalid tool arguments: {}", e)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
