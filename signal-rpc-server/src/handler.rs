use chrono::Utc;
use moka::future::Cache;
use serde_json::{json, Value};
use signal_core::{StockRecord, Symbol, SymbolUniverse};
use signal_data_services::{CacheKey, ResponseCache};
use signal_fetcher::llm::prompts;
use signal_fetcher::pacing::seconds;
use signal_fetcher::{BatchScheduler, LlmGateway};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HandlerConfig;
use crate::error::RpcError;
use crate::protocol::*;

/// Serves stock and LLM queries from the response cache, falling back to
/// the fetch pipeline on a miss
pub struct StockQueryHandler {
    universe: SymbolUniverse,
    cache: Arc<ResponseCache>,
    gateway: Arc<LlmGateway>,
    scheduler: Arc<BatchScheduler>,
    /// Coalesces concurrent `stock.get` misses for the same symbol
    inflight: Cache<String, Arc<StockRecord>>,
    config: HandlerConfig,
}

impl StockQueryHandler {
    pub fn new(
        universe: SymbolUniverse,
        cache: Arc<ResponseCache>,
        scheduler: Arc<BatchScheduler>,
        config: HandlerConfig,
    ) -> Self {
        let gateway = Arc::clone(scheduler.fetcher().gateway());
        let inflight = Cache::builder()
            .max_capacity(universe.len().max(1) as u64)
            .time_to_live(Duration::from_secs(60))
            .build();

        Self {
            universe,
            cache,
            gateway,
            scheduler,
            inflight,
            config,
        }
    }

    /// Handle `llm.search`
    pub async fn llm_search(&self, params: LlmSearchParams) -> Result<Value, RpcError> {
        if params.prompt.trim().is_empty() {
            return Err(RpcError::InvalidParams("prompt must not be empty".to_string()));
        }

        let key = CacheKey::prompt(params.prompt.as_str(), params.template.as_deref());

        if !params.force_refresh {
            if let Some(cached) = self.cache.get(&key) {
                tracing::debug!("llm.search served from cache");
                return Ok(mark(cached, true));
            }
        }

        // an explicit system prompt wins over a template
        let system_prompt = match (&params.system_prompt, &params.template) {
            (Some(system_prompt), _) => system_prompt.clone(),
            (None, Some(template)) => prompts::system_prompt(template).to_string(),
            (None, None) => prompts::system_prompt(prompts::DEFAULT_TEMPLATE).to_string(),
        };

        let response = self.gateway.complete(&params.prompt, &system_prompt).await;
        if let Some(error) = response.get("error") {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(RpcError::LlmError(message));
        }

        self.cache.set(&key, &response, None);
        Ok(mark(response, false))
    }

    /// Handle `stock.get`
    pub async fn stock_get(&self, params: StockGetParams) -> Result<Value, RpcError> {
        let symbol = self.universe.resolve(&params.symbol)?;
        let key = CacheKey::symbol(&symbol);

        if !params.force_refresh {
            if let Some(record) = self.cache.get_as::<StockRecord>(&key) {
                tracing::debug!("stock.get {} served from cache", symbol);
                return Ok(mark(to_value(&record)?, true));
            }
        }

        let record = self.fetch_coalesced(&symbol).await?;
        self.cache.set(&key, &to_value(record.as_ref())?, None);
        Ok(mark(to_value(record.as_ref())?, false))
    }

    /// Handle `stock.search`
    pub async fn stock_search(&self, params: StockSearchParams) -> Result<StockSearchResponse, RpcError> {
        let (valid, invalid_symbols) = self.universe.partition(&params.symbols);
        if valid.is_empty() {
            return Err(RpcError::InvalidParams(format!(
                "no supported symbols in {:?}",
                invalid_symbols
            )));
        }

        let mut data = BTreeMap::new();
        let mut cached = Vec::new();
        let mut misses: Vec<Symbol> = Vec::new();

        for symbol in dedupe(valid) {
            let hit = if params.force_refresh {
                None
            } else {
                self.cache.get_as::<StockRecord>(&CacheKey::symbol(&symbol))
            };

            match hit {
                Some(record) => {
                    cached.push(symbol.to_string());
                    data.insert(symbol.to_string(), record);
                }
                None => misses.push(symbol),
            }
        }

        let mut fetched = Vec::new();
        let mut failed = Vec::new();

        if !misses.is_empty() {
            tracing::info!("stock.search fetching {} uncached symbols", misses.len());
            let report = self
                .scheduler
                .run_batch(
                    &misses,
                    misses.len(),
                    seconds(self.config.search_batch_delay_seconds),
                )
                .await
                .map_err(|e| RpcError::InternalError(e.to_string()))?;

            failed = report.failed_symbols.clone();
            for (symbol, record) in report.data {
                if !record.is_success() {
                    continue;
                }
                if let Ok(symbol) = self.universe.resolve(&symbol) {
                    self.cache.set(&CacheKey::symbol(&symbol), &to_value(&record)?, None);
                }
                fetched.push(symbol.clone());
                data.insert(symbol, record);
            }
        }

        Ok(StockSearchResponse {
            data,
            cached,
            fetched,
            failed,
            invalid_symbols,
        })
    }

    /// Handle `stock.batch`: `stock.search` with an upper bound on input size
    pub async fn stock_batch(&self, params: StockSearchParams) -> Result<StockSearchResponse, RpcError> {
        if params.symbols.len() > self.config.max_batch_symbols {
            return Err(RpcError::TooManySymbols {
                got: params.symbols.len(),
                limit: self.config.max_batch_symbols,
            });
        }
        self.stock_search(params).await
    }

    pub fn symbols(&self) -> SymbolsResponse {
        SymbolsResponse {
            symbols: self.universe.iter().map(|s| s.to_string()).collect(),
            count: self.universe.len(),
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy".to_string(),
            backend: self.gateway.backend_name().to_string(),
            timestamp: Utc::now(),
            symbols: self.universe.len(),
            cache: self.cache.stats(),
        }
    }

    /// One fetch per symbol at a time; concurrent callers share the result
    async fn fetch_coalesced(&self, symbol: &Symbol) -> Result<Arc<StockRecord>, RpcError> {
        let fetcher = Arc::clone(self.scheduler.fetcher());
        let owned = symbol.clone();

        let result = self
            .inflight
            .try_get_with(symbol.cache_key(), async move {
                fetcher
                    .fetch_one(&owned)
                    .await
                    .map(Arc::new)
                    .ok_or_else(|| RpcError::FetchFailed(owned.to_string()))
            })
            .await;

        self.inflight.invalidate(&symbol.cache_key()).await;
        result.map_err(|e| e.as_ref().clone())
    }
}

/// Tag a response with `_cached` or `_fresh`
fn mark(mut value: Value, cached: bool) -> Value {
    if let Some(object) = value.as_object_mut() {
        let marker = if cached { "_cached" } else { "_fresh" };
        object.insert(marker.to_string(), json!(true));
    }
    value
}

fn to_value(record: &StockRecord) -> Result<Value, RpcError> {
    serde_json::to_value(record).map_err(|e| RpcError::InternalError(e.to_string()))
}

fn dedupe(symbols: Vec<Symbol>) -> Vec<Symbol> {
    let mut seen = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if !seen.contains(&symbol) {
            seen.push(symbol);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_data_services::CacheConfig;
    use signal_fetcher::llm::ChatMessage;
    use signal_fetcher::testkit::{RecordingPacer, ScriptedBackend, ScriptedReply};
    use signal_fetcher::{FetcherConfig, RetryingFetcher};

    fn handler_with(
        dir: &std::path::Path,
        backend: Arc<ScriptedBackend>,
    ) -> StockQueryHandler {
        let cache = Arc::new(
            ResponseCache::new(CacheConfig {
                dir: dir.to_path_buf(),
                default_ttl_seconds: 3600,
            })
            .unwrap(),
        );
        let fetcher = RetryingFetcher::new(
            Arc::new(LlmGateway::new(backend)),
            FetcherConfig {
                api_delay_seconds: 0.0,
                max_retries: 1,
            },
        )
        .with_pacer(Arc::new(RecordingPacer::default()));

        StockQueryHandler::new(
            SymbolUniverse::default(),
            cache,
            Arc::new(BatchScheduler::new(Arc::new(fetcher))),
            HandlerConfig::default(),
        )
    }

    fn backend() -> Arc<ScriptedBackend> {
        Arc::new(
            ScriptedBackend::new()
                .on("TSLA", vec![ScriptedReply::fail("down")])
                .with_fallback(ScriptedReply::json(json!({"price": "$10.00", "change": 1.5}))),
        )
    }

    #[tokio::test]
    async fn test_stock_get_caches() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = backend();
        let handler = handler_with(tmp.path(), backend.clone());

        let params = || StockGetParams {
            symbol: " aapl".to_string(),
            force_refresh: false,
        };

        let first = handler.stock_get(params()).await.unwrap();
        assert_eq!(first["_fresh"], true);
        assert_eq!(first["symbol"], "AAPL");

        let second = handler.stock_get(params()).await.unwrap();
        assert_eq!(second["_cached"], true);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stock_get_rejects_unknown_symbol() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = backend();
        let handler = handler_with(tmp.path(), backend.clone());

        let err = handler
            .stock_get(StockGetParams {
                symbol: "ZZZZ".to_string(),
                force_refresh: false,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), UNKNOWN_SYMBOL);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stock_get_failure_not_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let handler = handler_with(tmp.path(), backend());

        let err = handler
            .stock_get(StockGetParams {
                symbol: "TSLA".to_string(),
                force_refresh: false,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), FETCH_FAILED);
        assert_eq!(handler.cache().stats().total_files, 0);
    }

    #[tokio::test]
    async fn test_concurrent_gets_coalesce() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_fallback(ScriptedReply::json(json!({"change": 2.0})))
                .with_latency(Duration::from_millis(50)),
        );
        let handler = handler_with(tmp.path(), backend.clone());

        let params = || StockGetParams {
            symbol: "NVDA".to_string(),
            force_refresh: true,
        };
        let (a, b) = tokio::join!(handler.stock_get(params()), handler.stock_get(params()));

        assert_eq!(a.unwrap()["change"], 2.0);
        assert_eq!(b.unwrap()["change"], 2.0);
        assert_eq!(backend.call_count(), 1);

        // a later miss fetches again
        handler.stock_get(params()).await.unwrap();
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_stock_search_partitions() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = backend();
        let handler = handler_with(tmp.path(), backend.clone());

        handler
            .stock_get(StockGetParams {
                symbol: "AAPL".to_string(),
                force_refresh: false,
            })
            .await
            .unwrap();

        let result = handler
            .stock_search(StockSearchParams {
                symbols: vec!["AAPL".into(), "msft".into(), "TSLA".into(), "NOPE".into()],
                force_refresh: false,
            })
            .await
            .unwrap();

        assert_eq!(result.cached, vec!["AAPL"]);
        assert_eq!(result.fetched, vec!["MSFT"]);
        assert_eq!(result.failed, vec!["TSLA"]);
        assert_eq!(result.invalid_symbols, vec!["NOPE"]);
        assert_eq!(result.data.len(), 2);
    }

    #[tokio::test]
    async fn test_stock_search_needs_a_valid_symbol() {
        let tmp = tempfile::tempdir().unwrap();
        let handler = handler_with(tmp.path(), backend());

        let err = handler
            .stock_search(StockSearchParams {
                symbols: vec!["NOPE".into()],
                force_refresh: false,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_stock_batch_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let handler = handler_with(tmp.path(), backend());

        let symbols = signal_core::DEFAULT_SYMBOLS[..11]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = handler
            .stock_batch(StockSearchParams {
                symbols,
                force_refresh: false,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), TOO_MANY_SYMBOLS);
        assert!(err.data().is_some());
    }

    #[tokio::test]
    async fn test_llm_search_cache_and_markers() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            ScriptedBackend::new().on("weather", vec![ScriptedReply::json(json!({"temp": 21}))]),
        );
        let handler = handler_with(tmp.path(), backend.clone());

        let params = |force_refresh| LlmSearchParams {
            prompt: "weather in Paris".to_string(),
            system_prompt: None,
            template: Some("default".to_string()),
            force_refresh,
        };

        let fresh = handler.llm_search(params(false)).await.unwrap();
        assert_eq!(fresh, json!({"temp": 21, "_fresh": true}));

        let cached = handler.llm_search(params(false)).await.unwrap();
        assert_eq!(cached, json!({"temp": 21, "_cached": true}));

        handler.llm_search(params(true)).await.unwrap();
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_llm_search_system_prompt_wins_over_template() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(
            ScriptedBackend::new().on("treasure", vec![ScriptedReply::json(json!({"arr": true}))]),
        );
        let handler = handler_with(tmp.path(), backend.clone());

        handler
            .llm_search(LlmSearchParams {
                prompt: "where is the treasure".to_string(),
                system_prompt: Some("be a pirate".to_string()),
                template: Some(prompts::STOCK_ANALYZER.to_string()),
                force_refresh: false,
            })
            .await
            .unwrap();

        let calls = backend.calls();
        assert_eq!(calls[0][0], ChatMessage::System("be a pirate".to_string()));
    }

    #[tokio::test]
    async fn test_llm_search_errors_not_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let handler = handler_with(tmp.path(), Arc::new(ScriptedBackend::new()));

        let err = handler
            .llm_search(LlmSearchParams {
                prompt: "anything".to_string(),
                system_prompt: Some("sys".to_string()),
                template: None,
                force_refresh: false,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), LLM_ERROR);
        assert_eq!(handler.cache().stats().total_files, 0);

        let empty = handler
            .llm_search(LlmSearchParams {
                prompt: " ".to_string(),
                system_prompt: None,
                template: None,
                force_refresh: false,
            })
            .await
            .unwrap_err();
        assert_eq!(empty.code(), INVALID_PARAMS);
    }
}
