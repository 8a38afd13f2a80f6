//! Google Gemini backend.

use super::{truncate_body, BackendError, BackendReply, ReasoningBackend};
use crate::message::{ChatMessage, Role};
use async_trait::async_trait;
use mdr_actions::ToolSchema;
use mdr_connectors::SecureString;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Gemini backend configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: SecureString,
    /// Model name (e.g. "gemini-1.5-pro"). A leading `models/` is accepted.
    pub model: String,
    pub endpoint: String,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: SecureString::default(),
            model: "gemini-1.5-pro".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: None,
            timeout_secs: 60,
        }
    }
}

/// Backend for the Gemini `generateContent` API.
///
/// This backend is text-only. Tool schemas are never sent and replies never
/// carry tool calls, so an investigation driven by it always concludes after
/// a single round-trip. System messages are folded into the first user turn
/// and every non-user turn is sent with the `model` role.
pub struct GeminiBackend {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn build_url(&self) -> String {
        let model = self
            .config
            .model
            .strip_prefix("models/")
            .unwrap_or(&self.config.model);
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            model
        )
    }

    fn build_request(&self, history: &[ChatMessage]) -> GeminiRequest {
        GeminiRequest {
            contents: build_contents(history),
            generation_config: self
                .config
                .temperature
                .map(|temperature| GeminiGenerationConfig { temperature }),
        }
    }
}

/// Converts the history into Gemini contents.
fn build_contents(history: &[ChatMessage]) -> Vec<GeminiContent> {
    let system: Vec<&str> = history
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.text())
        .collect();
    let mut pending_system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };

    let mut contents = Vec::new();
    for message in history.iter().filter(|m| m.role != Role::System) {
        let role = if message.role == Role::User {
            "user"
        } else {
            "model"
        };
        let text = match (role, pending_system.take()) {
            ("user", Some(instruction)) => format!(
                "System Instruction: {}\n\nUser Message: {}",
                instruction,
                message.text()
            ),
            (_, leftover) => {
                pending_system = leftover;
                message.text().to_string()
            }
        };
        contents.push(GeminiContent {
            role: role.to_string(),
            parts: vec![GeminiPart { text }],
        });
    }

    if let Some(instruction) = pending_system {
        contents.insert(
            0,
            GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: format!("System Instruction: {}", instruction),
                }],
            },
        );
    }
    contents
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

fn parse_reply(body: &str) -> Result<BackendReply, BackendError> {
    let parsed: GeminiResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Serialization(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(BackendError::Response(format!(
            "Gemini API error: {}",
            error.message
        )));
    }

    let text = parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| BackendError::Response("No content in response".to_string()))?;

    Ok(BackendReply::text(text))
}

#[async_trait]
impl ReasoningBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, history, _tools), fields(model = %self.config.model, messages = history.len()))]
    async fn chat(
        &self,
        history: &[ChatMessage],
        _tools: &[&ToolSchema],
    ) -> Result<BackendReply, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(self.config.api_key.expose_secret())
                .map_err(|e| BackendError::Http(e.to_string()))?,
        );

        let response = self
            .client
            .post(self.build_url())
            .headers(headers)
            .json(&self.build_request(history))
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Response(format!(
                "HTTP {}: {}",
                status,
                truncate_body(&text, 500)
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;
        let reply = parse_reply(&text)?;
        debug!("Gemini reply received");
        Ok(reply)
    }
}
