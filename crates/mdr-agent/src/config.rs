//! YAML configuration for the investigation agent.
//!
//! `${VAR}` references anywhere in the file are replaced with environment
//! variables before parsing, so credentials can stay out of the file:
//!
//! ```yaml
//! backend:
//!   provider: openai
//!   model: gpt-4o
//!   api_key: ${OPENAI_API_KEY}
//! max_iterations: 5
//! playbook: detailed_host_investigation
//! tenants:
//!   tenant-a:
//!     vendor: fidelis
//!     config:
//!       server_url: https://fidelis.example.com
//!       username: svc-mdr
//!       password: ${FIDELIS_PASSWORD}
//! ```

use crate::backend::{
    BackendError, GeminiBackend, GeminiConfig, OpenAiBackend, OpenAiConfig, ReasoningBackend,
};
use crate::engine::{InvestigationEngine, DEFAULT_MAX_ITERATIONS, DEFAULT_SYSTEM_PROMPT};
use crate::playbook::{PlaybookError, PlaybookLoader};
use mdr_connectors::{
    register_builtin_packs, AdapterFactory, EndpointAdapter, PackConfig, PackError, PackRegistry,
    SecureString,
};
use mdr_observability::LoggingConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::info;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    #[error(transparent)]
    Playbook(#[from] PlaybookError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Pack(#[from] PackError),
}

/// Reasoning provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
}

/// Reasoning backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub provider: BackendProvider,
    /// Model name; the provider default is used when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub api_key: SecureString,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_timeout() -> u64 {
    60
}

/// Binds a tenant to a vendor pack and its configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantBinding {
    pub vendor: String,
    #[serde(default)]
    pub config: PackConfig,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub backend: BackendConfig,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Literal system prompt. Mutually exclusive with `playbook`.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Name of a playbook whose content becomes the system prompt.
    #[serde(default)]
    pub playbook: Option<String>,
    /// Playbook directory; the bundled playbooks are used when absent.
    #[serde(default)]
    pub playbook_dir: Option<PathBuf>,
    /// Vendor pack root; the bundled packs are used when absent.
    #[serde(default)]
    pub pack_root: Option<PathBuf>,
    #[serde(default)]
    pub tenants: BTreeMap<String, TenantBinding>,
    #[serde(default)]
    pub logging: LogSettings,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

impl AgentConfig {
    /// Loads, substitutes and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        info!(path = %path.display(), tenants = config.tenants.len(), "Loaded agent configuration");
        Ok(config)
    }

    /// Parses configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let substituted = substitute_env_vars(content)?;
        let config: AgentConfig = serde_yaml::from_str(&substituted)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.api_key.is_empty() {
            return Err(ConfigError::MissingField("backend.api_key".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.system_prompt.is_some() && self.playbook.is_some() {
            return Err(ConfigError::InvalidValue(
                "system_prompt and playbook are mutually exclusive".to_string(),
            ));
        }
        for (tenant, binding) in &self.tenants {
            if binding.vendor.trim().is_empty() {
                return Err(ConfigError::MissingField(format!("tenants.{}.vendor", tenant)));
            }
        }
        Ok(())
    }

    /// Subscriber settings for `mdr_observability::init_logging_with_config`.
    pub fn logging_config(&self) -> LoggingConfig {
        let base = if self.logging.json_format {
            LoggingConfig::production()
        } else {
            LoggingConfig::default()
        };
        base.with_level_name(&self.logging.level)
    }

    pub fn playbook_loader(&self) -> PlaybookLoader {
        match &self.playbook_dir {
            Some(dir) => PlaybookLoader::new(dir),
            None => PlaybookLoader::bundled(),
        }
    }

    /// The configured prompt, the named playbook, or the default prompt.
    pub fn resolve_system_prompt(&self) -> Result<String, ConfigError> {
        if let Some(prompt) = &self.system_prompt {
            return Ok(prompt.clone());
        }
        if let Some(name) = &self.playbook {
            return Ok(self.playbook_loader().get(name)?);
        }
        Ok(DEFAULT_SYSTEM_PROMPT.to_string())
    }

    /// Builds the configured reasoning backend.
    pub fn build_backend(&self) -> Result<Arc<dyn ReasoningBackend>, ConfigError> {
        let settings = &self.backend;
        let backend: Arc<dyn ReasoningBackend> = match settings.provider {
            BackendProvider::OpenAi => {
                let defaults = OpenAiConfig::default();
                Arc::new(OpenAiBackend::new(OpenAiConfig {
                    api_key: settings.api_key.clone(),
                    model: settings.model.clone().unwrap_or(defaults.model),
                    endpoint: settings.endpoint.clone().unwrap_or(defaults.endpoint),
                    temperature: settings.temperature,
                    timeout_secs: settings.timeout_secs,
                })?)
            }
            BackendProvider::Gemini => {
                let defaults = GeminiConfig::default();
                Arc::new(GeminiBackend::new(GeminiConfig {
                    api_key: settings.api_key.clone(),
                    model: settings.model.clone().unwrap_or(defaults.model),
                    endpoint: settings.endpoint.clone().unwrap_or(defaults.endpoint),
                    temperature: settings.temperature,
                    timeout_secs: settings.timeout_secs,
                })?)
            }
        };
        Ok(backend)
    }

    /// Builds an engine with the configured backend, prompt and budget.
    pub fn build_engine(&self) -> Result<InvestigationEngine, ConfigError> {
        Ok(
            InvestigationEngine::new(self.build_backend()?, self.resolve_system_prompt()?)
                .with_max_iterations(self.max_iterations),
        )
    }

    /// Pack registry rooted at `pack_root`, with the built-in packs registered.
    pub fn pack_registry(&self) -> PackRegistry {
        match &self.pack_root {
            Some(root) => {
                let mut registry = PackRegistry::new(root);
                register_builtin_packs(&mut registry);
                registry
            }
            None => PackRegistry::bundled(),
        }
    }

    pub fn tenant(&self, tenant_id: &str) -> Option<&TenantBinding> {
        self.tenants.get(tenant_id)
    }

    /// Builds a fresh adapter for a configured tenant.
    pub fn adapter_for_tenant(
        &self,
        factory: &AdapterFactory,
        tenant_id: &str,
    ) -> Result<Arc<dyn EndpointAdapter>, ConfigError> {
        let binding = self
            .tenant(tenant_id)
            .ok_or_else(|| ConfigError::UnknownTenant(tenant_id.to_string()))?;
        Ok(factory.get(&binding.vendor.to_lowercase(), tenant_id, &binding.config)?)
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid regex for env vars")
    })
}

/// Replaces `${VAR}` with environment values. Every missing variable is reported.
fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut missing = Vec::new();
    let result = env_var_pattern().replace_all(input, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match env::var(name) {
            Ok(value) => value,
            Err(_) => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }
    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
backend:
  provider: gemini
  api_key: test-key
"#;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.backend.provider, BackendProvider::Gemini);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.backend.timeout_secs, 60);
        assert!(config.tenants.is_empty());
        assert_eq!(config.resolve_system_prompt().unwrap(), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.logging_config().level, tracing::Level::INFO);
    }

    #[test]
    fn test_logging_section() {
        let yaml = format!("{}logging:\n  level: debug\n  json_format: true\n", MINIMAL);
        let logging = AgentConfig::from_yaml_str(&yaml).unwrap().logging_config();
        assert_eq!(logging.level, tracing::Level::DEBUG);
        assert_eq!(logging.format, mdr_observability::LogFormat::Json);
    }

    #[test]
    fn test_env_substitution() {
        env::set_var("MDR_AGENT_TEST_KEY", "sk-from-env");
        env::set_var("MDR_AGENT_TEST_PASSWORD", "hunter2");
        let yaml = r#"
backend:
  provider: openai
  model: gpt-4o-mini
  api_key: ${MDR_AGENT_TEST_KEY}
max_iterations: 3
tenants:
  tenant-a:
    vendor: fidelis
    config:
      server_url: https://fidelis.example.com
      username: svc
      password: ${MDR_AGENT_TEST_PASSWORD}
"#;
        let config = AgentConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.backend.api_key.expose_secret(), "sk-from-env");
        assert_eq!(config.max_iterations, 3);
        let binding = config.tenant("tenant-a").unwrap();
        assert_eq!(binding.vendor, "fidelis");
        assert_eq!(binding.config["password"], "hunter2");
        assert!(!format!("{:?}", config.backend).contains("sk-from-env"));
    }

    #[test]
    fn test_missing_env_vars_are_all_reported() {
        let err = substitute_env_vars("a: ${MDR_AGENT_UNSET_ONE}\nb: ${MDR_AGENT_UNSET_TWO}")
            .unwrap_err();
        match err {
            ConfigError::EnvVarNotFound(names) => {
                assert_eq!(names, "MDR_AGENT_UNSET_ONE, MDR_AGENT_UNSET_TWO");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation() {
        let no_key = "backend:\n  provider: openai\n  api_key: \"\"\n";
        assert!(matches!(
            AgentConfig::from_yaml_str(no_key),
            Err(ConfigError::MissingField(_))
        ));

        let both = format!("{}system_prompt: x\nplaybook: y\n", MINIMAL);
        assert!(matches!(
            AgentConfig::from_yaml_str(&both),
            Err(ConfigError::InvalidValue(_))
        ));

        let zero = format!("{}max_iterations: 0\n", MINIMAL);
        assert!(AgentConfig::from_yaml_str(&zero).is_err());

        let bad_provider = "backend:\n  provider: llama\n  api_key: k\n";
        assert!(matches!(
            AgentConfig::from_yaml_str(bad_provider),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_playbook_prompt() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("triage.md"), "# Triage\nCheck the host.").unwrap();
        let yaml = format!(
            "{}playbook: triage\nplaybook_dir: {}\n",
            MINIMAL,
            dir.path().display()
        );
        let config = AgentConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(
            config.resolve_system_prompt().unwrap(),
            "# Triage\nCheck the host."
        );

        let missing = format!(
            "{}playbook: nope\nplaybook_dir: {}\n",
            MINIMAL,
            dir.path().display()
        );
        let config = AgentConfig::from_yaml_str(&missing).unwrap();
        assert!(matches!(
            config.resolve_system_prompt(),
            Err(ConfigError::Playbook(PlaybookError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_build_engine() {
        let yaml = format!("{}system_prompt: Be brief.\nmax_iterations: 2\n", MINIMAL);
        let engine = AgentConfig::from_yaml_str(&yaml)
            .unwrap()
            .build_engine()
            .unwrap();
        assert_eq!(engine.system_prompt(), "Be brief.");
        assert_eq!(engine.max_iterations(), 2);
    }

    #[test]
    fn test_unknown_tenant() {
        let config = AgentConfig::from_yaml_str(MINIMAL).unwrap();
        let factory = AdapterFactory::new(Arc::new(config.pack_registry()));
        assert!(matches!(
            config.adapter_for_tenant(&factory, "ghost"),
            Err(ConfigError::UnknownTenant(_))
        ));
    }
}
