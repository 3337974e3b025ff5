//! Model router for OpenAI-compatible chat completion endpoints
//!
//! Picks the intent-recognition or analysis model from the request's
//! settings (`litellm_params`: `model`, `api_base`, `api_key`, `temperature`)
//! and calls `POST {api_base}/chat/completions`.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AgentError;
use crate::llm::{ChatModel, ModelTarget};
use crate::models::{JsonMap, Message, Role};
use crate::settings::RunConfig;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Reusable model client (connection-pooled)
pub struct ModelRouter {
    client: Client,
    default_api_base: String,
}

impl ModelRouter {
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Router whose models default to `api_base` when their params name none.
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            default_api_base: api_base.into(),
        }
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Endpoint parameters resolved from one `litellm_params` section.
#[derive(Debug, Clone, PartialEq)]
struct ModelParams {
    model: String,
    api_base: String,
    api_key: Option<String>,
    temperature: Option<f64>,
}

impl ModelParams {
    fn resolve(params: &JsonMap, default_api_base: &str, target: ModelTarget) -> Result<Self> {
        let text = |key: &str| {
            params
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let configured = text("model").ok_or_else(|| {
            AgentError::LlmError(format!("No {} model configured in settings", target))
        })?;

        // "openai/gpt-4o" names the provider first; the endpoint wants only the model.
        let model = configured
            .split_once('/')
            .map(|(_, name)| name.to_string())
            .unwrap_or(configured);

        Ok(Self {
            model,
            api_base: text("api_base")
                .unwrap_or_else(|| default_api_base.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: text("api_key"),
            temperature: params.get("temperature").and_then(Value::as_f64),
        })
    }
}

#[async_trait]
impl ChatModel for ModelRouter {
    async fn invoke(
        &self,
        messages: &[Message],
        config: &RunConfig,
        target: ModelTarget,
    ) -> Result<Message> {
        let settings = config.settings()?;
        let section = match target {
            ModelTarget::IntentRecognition => settings.intent_recognition_model(),
            ModelTarget::Analysis => settings.analysis_model(),
        };
        let params = ModelParams::resolve(&section, &self.default_api_base, target)?;

        let request = ChatRequest {
            model: &params.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: params.temperature,
        };

        info!(model = %params.model, %target, messages = messages.len(), "Calling model");

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", params.api_base))
            .json(&request);
        if let Some(key) = &params.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            error!("Model request failed: {}", e);
            AgentError::LlmError(format!("Model request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Model error response ({}): {}", status, error_text);
            return Err(AgentError::LlmError(format!(
                "Model returned {}: {}",
                status, error_text
            )));
        }

        let completion: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse model response: {}", e);
            AgentError::LlmError(format!("Model response parse error: {}", e))
        })?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::LlmError("Model returned no choices".to_string()))?;

        info!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            "Model response received"
        );

        Ok(Message::assistant(choice.message.content.unwrap_or_default()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        // Tool results here never answer a native tool call, so they are
        // replayed as assistant text.
        let (role, content) = match message.role {
            Role::System => ("system", message.text()),
            Role::User => ("user", message.text()),
            Role::Assistant => ("assistant", message.text()),
            Role::Tool => (
                "assistant",
                format!(
                    "Tool {} returned: {}",
                    message.name.as_deref().unwrap_or("unknown"),
                    message.text()
                ),
            ),
        };
        Self { role, content }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> RunConfig {
        RunConfig::with_settings(&json!({
            "intentRecognitionModel": {
                "model": "openai/gpt-4o-mini",
                "api_base": server.uri(),
                "api_key": "sk-intent"
            },
            "analysisModel": {"model": "gpt-4o", "api_base": server.uri()}
        }))
    }

    #[test]
    fn test_request_serialization() {
        let messages = [Message::system("You are helpful"), Message::tool("news", "1", "[]")];
        let request = ChatRequest {
            model: "gpt-4o",
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert!(json["messages"][1]["content"].as_str().unwrap().contains("news"));
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_params_strip_provider_prefix() {
        let params = json!({"model": "openai/gpt-4o", "api_base": "http://h/v1/"});
        let resolved = ModelParams::resolve(
            params.as_object().unwrap(),
            DEFAULT_API_BASE,
            ModelTarget::Analysis,
        )
        .unwrap();

        assert_eq!(resolved.model, "gpt-4o");
        assert_eq!(resolved.api_base, "http://h/v1");
        assert!(resolved.api_key.is_none());
    }

    #[tokio::test]
    async fn test_invoke_routes_to_intent_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-intent"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "[\"AAPL\"]"}, "finish_reason": "stop"}]
            })))
            .mount(&server)
            .await;

        let router = ModelRouter::new();
        let reply = router
            .invoke(&[Message::user("apple?")], &config_for(&server), ModelTarget::IntentRecognition)
            .await
            .unwrap();

        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text(), "[\"AAPL\"]");
    }

    #[tokio::test]
    async fn test_error_status_is_llm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let result = ModelRouter::new()
            .invoke(&[], &config_for(&server), ModelTarget::Analysis)
            .await;

        match result {
            Err(AgentError::LlmError(msg)) => assert!(msg.contains("rate limited")),
            other => panic!("expected LlmError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_model_is_reported() {
        let result = ModelRouter::new()
            .invoke(&[], &RunConfig::new(), ModelTarget::Analysis)
            .await;
        assert!(matches!(result, Err(AgentError::LlmError(_))));
    }
}
