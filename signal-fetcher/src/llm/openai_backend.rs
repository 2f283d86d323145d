use anyhow::{anyhow, Result};
use async_openai::{config::OpenAIConfig, Client as OpenAiClient};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::backend::{BackendTurn, ChatBackend, ChatMessage, ToolCall, TurnFinish};

/// Name of the provider-side search tool
pub const WEB_SEARCH_TOOL: &str = "$web_search";

/// Tool type the provider executes itself
const BUILTIN_FUNCTION: &str = "builtin_function";

/// Configuration for the OpenAI-compatible backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub requests_per_minute: u32,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.moonshot.cn/v1".to_string(),
            model: "kimi-k2-0711-preview".to_string(),
            temperature: 0.3,
            requests_per_minute: 20,
            timeout_seconds: 30,
        }
    }
}

/// Chat backend for any OpenAI-compatible endpoint (Moonshot by default).
///
/// Requests are sent as raw JSON because the search tool is a
/// `builtin_function`, which the typed request builders cannot express.
pub struct OpenAiBackend {
    client: OpenAiClient<OpenAIConfig>,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    config: LlmConfig,
}

impl OpenAiBackend {
    /// Create a new backend
    ///
    /// # Arguments
    /// * `config` - endpoint, model and pacing settings
    /// * `api_key` - API key for the endpoint
    pub fn new(config: LlmConfig, api_key: String) -> Result<Self> {
        tracing::info!(
            "Initializing LLM backend: base={}, model={}, rate_limit={}/min",
            config.api_base,
            config.model,
            config.requests_per_minute
        );

        let client = OpenAiClient::with_config(
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(config.api_base.clone()),
        );

        let requests_per_minute = NonZeroU32::new(config.requests_per_minute)
            .ok_or_else(|| anyhow!("requests_per_minute must be > 0"))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(requests_per_minute)));

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        json!({
            "model": self.config.model,
            "messages": messages.iter().map(to_request_message).collect::<Vec<_>>(),
            "temperature": self.config.temperature,
            "response_format": { "type": "json_object" },
            "tools": tools(),
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<BackendTurn> {
        self.rate_limiter.until_ready().await;

        let request = self.request_body(messages);
        let response: Value = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_seconds),
            self.client.chat().create_byot(request),
        )
        .await
        .map_err(|_| anyhow!("LLM request timed out after {}s", self.config.timeout_seconds))?
        .map_err(|e| anyhow!("LLM API error: {}", e))?;

        parse_turn(&response)
    }
}

/// The single tool advertised on every request
fn tools() -> Value {
    json!([{
        "type": BUILTIN_FUNCTION,
        "function": { "name": WEB_SEARCH_TOOL }
    }])
}

fn tool_type(name: &str) -> &'static str {
    if name == WEB_SEARCH_TOOL {
        BUILTIN_FUNCTION
    } else {
        "function"
    }
}

fn to_request_message(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::System(text) => json!({ "role": "system", "content": text }),
        ChatMessage::User(text) => json!({ "role": "user", "content": text }),
        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut message = json!({ "role": "assistant", "content": content });
            if !tool_calls.is_empty() {
                message["tool_calls"] = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": tool_type(&call.name),
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments,
                            }
                        })
                    })
                    .collect();
            }
            message
        }
        ChatMessage::Tool {
            tool_call_id,
            content,
        } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "name": WEB_SEARCH_TOOL,
            "content": content,
        }),
    }
}

/// Read the first choice of a chat completion response
fn parse_turn(response: &Value) -> Result<BackendTurn> {
    let choice = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .ok_or_else(|| anyhow!("LLM response had no choices"))?;

    let finish = match choice.get("finish_reason").and_then(Value::as_str) {
        Some("stop") => TurnFinish::Stop,
        Some("tool_calls") => TurnFinish::ToolCalls,
        Some(other) => TurnFinish::Other(other.to_string()),
        None => TurnFinish::Other("none".to_string()),
    };

    let message = choice.get("message").cloned().unwrap_or(Value::Null);
    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|call| ToolCall {
                    id: text(call.get("id")),
                    name: text(call.pointer("/function/name")),
                    arguments: text(call.pointer("/function/arguments")),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(BackendTurn {
        finish,
        content: message
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string),
        tool_calls,
        tokens_used: response
            .pointer("/usage/total_tokens")
            .and_then(Value::as_u64)
            .map(|tokens| tokens as u32),
    })
}

fn text(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).unwrap_or_default().to_string()
}
