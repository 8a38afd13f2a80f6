//! OpenAI chat completions backend with native tool calling.

use super::{truncate_body, BackendError, BackendReply, ReasoningBackend};
use crate::message::{ChatMessage, ToolCallRequest};
use async_trait::async_trait;
use mdr_actions::ToolSchema;
use mdr_connectors::SecureString;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// OpenAI backend configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: SecureString,
    pub model: String,
    /// Base URL; `/chat/completions` is appended.
    pub endpoint: String,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: SecureString::default(),
            model: "gpt-4o".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            temperature: None,
            timeout_secs: 60,
        }
    }
}

/// Backend for OpenAI-compatible chat completion APIs.
///
/// The registry's schemas are sent as `tools` with `tool_choice: "auto"`,
/// and tool calls in the reply are passed through in model order.
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    fn build_request<'a>(
        &'a self,
        history: &'a [ChatMessage],
        tools: &[&ToolSchema],
    ) -> ChatRequest<'a> {
        let tools: Vec<Value> = tools.iter().map(|schema| schema.to_json()).collect();
        let tool_choice = if tools.is_empty() { None } else { Some("auto") };
        ChatRequest {
            model: &self.config.model,
            messages: history,
            tools,
            tool_choice,
            temperature: self.config.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallRequest>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn parse_reply(body: &str) -> Result<BackendReply, BackendError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Serialization(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(BackendError::Response(format!(
            "OpenAI API error: {}",
            error.message
        )));
    }

    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| BackendError::Response("Missing choices".to_string()))?;

    Ok(BackendReply {
        content: message.content,
        tool_calls: message.tool_calls,
    })
}

#[async_trait]
impl ReasoningBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, history, tools), fields(model = %self.config.model, messages = history.len()))]
    async fn chat(
        &self,
        history: &[ChatMessage],
        tools: &[&ToolSchema],
    ) -> Result<BackendReply, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", self.config.api_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| BackendError::Http(e.to_string()))?,
        );

        let body = self.build_request(history, tools);
        let response = self
            .client
            .post(self.completions_url())
            .headers(headers)
            .json(&body)
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
        debug!(tool_calls = reply.tool_calls.len(), "OpenAI reply received");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdr_actions::{ParameterDef, ParameterType};
    use serde_json::json;

    fn backend() -> OpenAiBackend {
        OpenAiBackend::new(OpenAiConfig {
            api_key: SecureString::new("sk-test".to_string()),
            endpoint: "https://llm.internal/v1/".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(
            backend().completions_url(),
            "https://llm.internal/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_includes_tools_with_auto_choice() {
        let backend = backend();
        let schema = ToolSchema::new(
            "list_processes",
            "List processes",
            vec![ParameterDef::required("hostname", "Host", ParameterType::String)],
        );
        let history = vec![ChatMessage::system("sys"), ChatMessage::user("alert")];
        let value = serde_json::to_value(backend.build_request(&history, &[&schema])).unwrap();

        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["tool_choice"], "auto");
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "list_processes");
        assert_eq!(value["messages"][1]["role"], "user");
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn test_request_without_tools_omits_tool_choice() {
        let backend = backend();
        let history = vec![ChatMessage::user("alert")];
        let value = serde_json::to_value(backend.build_request(&history, &[])).unwrap();

        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
    }

    #[test]
    fn test_parse_tool_call_reply() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "x", "arguments": "{}"}},
                        {"id": "b", "type": "function", "function": {"name": "y", "arguments": "{}"}}
                    ]
                }
            }]
        })
        .to_string();

        let reply = parse_reply(&body).unwrap();
        assert!(reply.content.is_none());
        let ids: Vec<_> = reply.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_error_and_empty_choices() {
        let err = parse_reply(r#"{"error": {"message": "quota exceeded"}}"#).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));

        let err = parse_reply(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, BackendError::Response(_)));

        let err = parse_reply("not json").unwrap_err();
        assert!(matches!(err, BackendError::Serialization(_)));
    }
}
