use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use super::backend::{ChatBackend, ChatMessage, ToolCall};
use super::prompts;

/// Tool rounds allowed before a conversation is abandoned
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("backend request failed: {0}")]
    Backend(String),

    #[error("backend returned no content")]
    EmptyContent,

    #[error("backend returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("malformed arguments for tool '{name}': {message}")]
    MalformedToolArguments { name: String, message: String },

    #[error("tool call loop exceeded {0} rounds")]
    ToolLoopExceeded(usize),
}

/// Single-call wrapper around a chat backend.
///
/// Runs the tool-call loop until the backend stops, then parses the final
/// content as JSON. Search tool calls are answered by echoing their
/// arguments; the backend performs the actual search.
pub struct LlmGateway {
    backend: Arc<dyn ChatBackend>,
    max_tool_rounds: usize,
}

impl LlmGateway {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run one completion. Never fails: errors come back as `{"error": msg}`.
    pub async fn complete(&self, prompt: &str, system_prompt: &str) -> Value {
        match self.try_complete(prompt, system_prompt).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("LLM completion failed: {}", e);
                json!({ "error": e.to_string() })
            }
        }
    }

    /// [`complete`](Self::complete) with the system prompt picked by template name
    pub async fn complete_with_template(&self, prompt: &str, template: &str) -> Value {
        self.complete(prompt, prompts::system_prompt(template)).await
    }

    pub async fn try_complete(
        &self,
        prompt: &str,
        system_prompt: &str,
    ) -> Result<Value, GatewayError> {
        if prompt.trim().is_empty() {
            return Err(GatewayError::EmptyPrompt);
        }

        tracing::debug!("Sending prompt to {} (length: {} chars)", self.backend.name(), prompt.len());

        let mut messages = vec![
            ChatMessage::System(system_prompt.to_string()),
            ChatMessage::User(prompt.to_string()),
        ];

        let mut rounds = 0;
        loop {
            let turn = self
                .backend
                .chat(&messages)
                .await
                .map_err(|e| GatewayError::Backend(format!("{:#}", e)))?;

            if !turn.wants_tools() {
                tracing::debug!(
                    "Backend finished after {} tool rounds, tokens={:?}",
                    rounds,
                    turn.tokens_used
                );
                return parse_content(turn.content.as_deref());
            }

            if rounds == self.max_tool_rounds {
                return Err(GatewayError::ToolLoopExceeded(self.max_tool_rounds));
            }
            rounds += 1;

            let mut results = Vec::with_capacity(turn.tool_calls.len());
            for call in &turn.tool_calls {
                tracing::debug!("Tool call {} ({}): {}", call.name, call.id, call.arguments);
                results.push(ChatMessage::Tool {
                    tool_call_id: call.id.clone(),
                    content: echo_tool_call(call)?,
                });
            }

            messages.push(ChatMessage::Assistant {
                content: turn.content,
                tool_calls: turn.tool_calls,
            });
            messages.extend(results);
        }
    }
}

/// Hand the parsed arguments back as the tool result
fn echo_tool_call(call: &ToolCall) -> Result<String, GatewayError> {
    let arguments: Value =
        serde_json::from_str(&call.arguments).map_err(|e| GatewayError::MalformedToolArguments {
            name: call.name.clone(),
            message: e.to_string(),
        })?;
    Ok(arguments.to_string())
}

fn parse_content(content: Option<&str>) -> Result<Value, GatewayError> {
    let text = content
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(GatewayError::EmptyContent)?;

    serde_json::from_str(text).map_err(|e| GatewayError::InvalidJson(e.to_string()))
}
