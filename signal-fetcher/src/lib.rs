pub mod campaign;
pub mod fetcher;
pub mod llm;
pub mod pacing;
pub mod scheduler;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

// Re-export commonly used items from llm module
pub use llm::{
    ChatBackend, FetchMetrics, GatewayError, LlmConfig, LlmGateway, OpenAiBackend,
    DEFAULT_MAX_TOOL_ROUNDS,
};

pub use campaign::{
    CampaignConfig, CampaignError, CampaignLedger, CampaignStatus, CampaignTick, FetchCampaign,
};
pub use fetcher::{FetcherConfig, RetryingFetcher};
pub use pacing::{Pacer, TokioPacer};
pub use scheduler::{BatchConfig, BatchScheduler, ScheduleError};
