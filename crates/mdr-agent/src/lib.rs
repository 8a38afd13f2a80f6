//! # mdr-agent
//!
//! Bounded, tool-using investigation of canonical alerts.
//!
//! An [`InvestigationEngine`] holds one [`ReasoningBackend`] and a system
//! prompt. For each alert it runs a sequential conversation in which the model
//! may call tools from a [`ToolRegistry`](mdr_actions::ToolRegistry), and it
//! stops when the model answers in plain text or the iteration budget runs out.
//!
//! ```no_run
//! use mdr_actions::ToolRegistry;
//! use mdr_agent::AgentConfig;
//! use std::path::Path;
//!
//! # async fn run(alert: mdr_core::Alert) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::load(Path::new("agent.yaml"))?;
//! let engine = config.build_engine()?;
//! let registry = ToolRegistry::new();
//!
//! let investigation = engine.investigate(&alert, &registry).await?;
//! println!("{}", investigation.conclusion());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod message;
pub mod playbook;

pub use backend::{
    BackendError, BackendReply, GeminiBackend, GeminiConfig, OpenAiBackend, OpenAiConfig,
    ReasoningBackend, ScriptedBackend,
};
pub use config::{
    AgentConfig, BackendConfig, BackendProvider, ConfigError, LogSettings, TenantBinding,
};
pub use engine::{
    EngineError, Investigation, InvestigationEngine, InvestigationState,
    BUDGET_EXHAUSTED_MESSAGE, DEFAULT_MAX_ITERATIONS, DEFAULT_SYSTEM_PROMPT,
    EMPTY_SUMMARY_PLACEHOLDER,
};
pub use message::{ChatMessage, FunctionCall, Role, ToolCallRequest};
pub use playbook::{register_playbook_tools, PlaybookError, PlaybookInfo, PlaybookLoader};
