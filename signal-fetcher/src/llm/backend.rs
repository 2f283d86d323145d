use anyhow::Result;
use async_trait::async_trait;

/// One message in a chat conversation
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON text, exactly as the model produced it
    pub arguments: String,
}

/// Why the backend ended its turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnFinish {
    Stop,
    ToolCalls,
    Other(String),
}

/// The backend's reply to one conversation turn
#[derive(Debug, Clone, PartialEq)]
pub struct BackendTurn {
    pub finish: TurnFinish,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub tokens_used: Option<u32>,
}

impl BackendTurn {
    pub fn stop(content: impl Into<String>) -> Self {
        Self {
            finish: TurnFinish::Stop,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tokens_used: None,
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            finish: TurnFinish::ToolCalls,
            content: None,
            tool_calls: calls,
            tokens_used: None,
        }
    }

    pub fn wants_tools(&self) -> bool {
        self.finish == TurnFinish::ToolCalls
    }
}

/// A chat-completion backend that can run one conversation turn.
///
/// Implementations request JSON-object output and advertise the web
/// search tool; the tool loop itself lives in the gateway.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage]) -> Result<BackendTurn>;
}
