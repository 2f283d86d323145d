pub mod backend;
pub mod gateway;
pub mod metrics;
pub mod openai_backend;
pub mod prompts;

// Re-export commonly used items
pub use backend::{BackendTurn, ChatBackend, ChatMessage, ToolCall, TurnFinish};
pub use gateway::{GatewayError, LlmGateway, DEFAULT_MAX_TOOL_ROUNDS};
pub use metrics::{FetchMetrics, MetricsTimer};
pub use openai_backend::{LlmConfig, OpenAiBackend, WEB_SEARCH_TOOL};
