/// Batch fetch integration tests
///
/// These tests verify the scheduler and the multi-session campaign against a
/// scripted backend:
/// - Partial failure accounting and success rate
/// - Partition and pacing
/// - Campaign resume, status, snapshots and failed-symbol reset
use serde_json::json;
use signal_core::{SymbolUniverse, FETCH_FAILED_MESSAGE};
use signal_fetcher::testkit::{RecordingPacer, ScriptedBackend, ScriptedReply};
use signal_fetcher::{
    BatchScheduler, CampaignConfig, CampaignTick, FetchCampaign, FetcherConfig, LlmGateway,
    RetryingFetcher,
};
use std::sync::Arc;
use std::time::Duration;

fn scheduler(
    backend: ScriptedBackend,
    max_retries: u32,
) -> (BatchScheduler, Arc<ScriptedBackend>, Arc<RecordingPacer>) {
    let backend = Arc::new(backend);
    let pacer = Arc::new(RecordingPacer::default());
    let fetcher = RetryingFetcher::new(
        Arc::new(LlmGateway::new(backend.clone())),
        FetcherConfig {
            api_delay_seconds: 1.0,
            max_retries,
        },
    )
    .with_pacer(pacer.clone());

    (BatchScheduler::new(Arc::new(fetcher)), backend, pacer)
}

fn analysis(asset: &str, change: f64) -> ScriptedReply {
    ScriptedReply::json(json!({
        "asset": asset,
        "price": "$100.00",
        "change": change,
        "signal": "bullish",
        "confidence": 70
    }))
}

#[cfg(test)]
mod batch_scheduler {
    use super::*;

    #[tokio::test]
    async fn test_aapl_succeeds_tsla_fails() {
        let universe = SymbolUniverse::new(["AAPL", "TSLA"]);
        let backend = ScriptedBackend::new()
            .on("AAPL", vec![analysis("AAPL", 1.2)])
            .on("TSLA", vec![ScriptedReply::fail("upstream error")]);
        let (scheduler, backend, pacer) = scheduler(backend, 2);

        let symbols = universe.resolve_all(&["AAPL", "TSLA"]).unwrap();
        let report = scheduler.run_batch(&symbols, 2, Duration::ZERO).await.unwrap();

        assert_eq!(report.successful_symbols, vec!["AAPL"]);
        assert_eq!(report.failed_symbols, vec!["TSLA"]);
        assert_eq!(report.success_rate, 50.0);

        let tsla = &report.data["TSLA"];
        assert!(!tsla.fetch_success);
        assert_eq!(tsla.error.as_deref(), Some(FETCH_FAILED_MESSAGE));

        assert_eq!(backend.calls_mentioning("AAPL"), 1);
        assert_eq!(backend.calls_mentioning("TSLA"), 2);
        // one backoff for TSLA, no inter-batch delay for a single batch
        assert_eq!(pacer.pauses(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn test_batch_completeness() {
        let universe = SymbolUniverse::default();
        let backend = ScriptedBackend::new()
            .on("AAPL", vec![analysis("AAPL", 0.5)])
            .on("NVDA", vec![analysis("NVDA", -0.7)]);
        let (scheduler, _, pacer) = scheduler(backend, 1);

        let symbols = universe.resolve_all(&["AAPL", "TSLA", "NVDA"]).unwrap();
        let report = scheduler.run_batch(&symbols, 2, Duration::ZERO).await.unwrap();

        let mut all: Vec<&str> = report
            .successful_symbols
            .iter()
            .chain(report.failed_symbols.iter())
            .map(String::as_str)
            .collect();
        all.sort();
        assert_eq!(all, vec!["AAPL", "NVDA", "TSLA"]);
        assert_eq!(report.success_rate, 66.67);
        assert_eq!(pacer.pauses(), vec![Duration::ZERO]);

        let summary = report.market_summary(3).unwrap();
        assert_eq!(summary.gainers_count, 1);
        assert_eq!(summary.losers_count, 1);
    }

    #[tokio::test]
    async fn test_partition_delay_count() {
        let universe = SymbolUniverse::default();
        let symbols: Vec<_> = universe.symbols()[..7].to_vec();

        for batch_size in 1..=8 {
            let backend = ScriptedBackend::new().with_fallback(ScriptedReply::json(json!({})));
            let (scheduler, backend, pacer) = scheduler(backend, 1);

            scheduler
                .run_batch(&symbols, batch_size, Duration::from_secs(3))
                .await
                .unwrap();

            let expected = symbols.len().div_ceil(batch_size) - 1;
            assert_eq!(pacer.pauses().len(), expected, "batch_size={}", batch_size);
            assert_eq!(backend.call_count(), symbols.len());
        }
    }

    #[tokio::test]
    async fn test_symbols_fetched_in_order() {
        let universe = SymbolUniverse::default();
        let backend = ScriptedBackend::new().with_fallback(ScriptedReply::json(json!({})));
        let (scheduler, backend, _) = scheduler(backend, 1);

        let symbols = universe.resolve_all(&["MSFT", "AAPL", "GOOGL"]).unwrap();
        scheduler.run_batch(&symbols, 2, Duration::ZERO).await.unwrap();

        let order: Vec<bool> = backend
            .calls()
            .iter()
            .zip(["MSFT", "AAPL", "GOOGL"])
            .map(|(messages, symbol)| {
                messages.iter().any(|m| {
                    matches!(m, signal_fetcher::llm::ChatMessage::User(text) if text.contains(symbol))
                })
            })
            .collect();
        assert_eq!(order, vec![true, true, true]);
    }
}

#[cfg(test)]
mod fetch_campaign {
    use super::*;

    fn campaign(
        dir: &std::path::Path,
        universe: SymbolUniverse,
        backend: ScriptedBackend,
    ) -> (FetchCampaign, Arc<RecordingPacer>) {
        let (scheduler, _, pacer) = scheduler(backend, 1);
        let config = CampaignConfig {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        };
        (FetchCampaign::new(universe, scheduler, config).unwrap(), pacer)
    }

    fn universe() -> SymbolUniverse {
        SymbolUniverse::new(["AAPL", "TSLA", "NVDA", "MSFT", "AMZN"])
    }

    fn backend() -> ScriptedBackend {
        ScriptedBackend::new()
            .on("TSLA", vec![ScriptedReply::fail("down")])
            .with_fallback(ScriptedReply::json(json!({"change": 1.0})))
    }

    #[tokio::test]
    async fn test_resume_across_processes() {
        let tmp = tempfile::tempdir().unwrap();

        let (first, _) = campaign(tmp.path(), universe(), backend());
        let tick = first.fetch_next_batch(2).await.unwrap();
        match tick {
            CampaignTick::Batch { report, remaining } => {
                assert_eq!(report.successful_symbols, vec!["AAPL"]);
                assert_eq!(report.failed_symbols, vec!["TSLA"]);
                assert_eq!(remaining, 3);
            }
            CampaignTick::Completed => panic!("expected a batch"),
        }
        drop(first);

        // a fresh instance picks up where the last one stopped
        let (second, _) = campaign(tmp.path(), universe(), backend());
        let pending: Vec<String> = second.pending().iter().map(|s| s.to_string()).collect();
        assert_eq!(pending, vec!["NVDA", "MSFT", "AMZN"]);

        let status = second.status();
        assert_eq!(status.completed, 1);
        assert_eq!(status.failed, 1);
        assert_eq!(status.completion_rate, 40.0);
        assert_eq!(status.next_batch, vec!["NVDA", "MSFT"]);
        assert_eq!(status.statistics.total_attempts, 2);
        assert!(status.last_update.is_some());
    }

    #[tokio::test]
    async fn test_run_continuous_until_done() {
        let tmp = tempfile::tempdir().unwrap();
        let (campaign, pacer) = campaign(tmp.path(), universe(), backend());

        let batches = campaign
            .run_continuous(2, Duration::from_secs(180))
            .await
            .unwrap();
        assert_eq!(batches, 3);
        assert!(campaign.pending().is_empty());

        // check interval between batches only
        let waits = pacer
            .pauses()
            .into_iter()
            .filter(|d| *d == Duration::from_secs(180))
            .count();
        assert_eq!(waits, 2);

        assert_eq!(
            campaign.fetch_next_batch(2).await.unwrap(),
            CampaignTick::Completed
        );

        let snapshots = campaign.snapshots().list().unwrap();
        assert_eq!(snapshots.len(), 4);
        assert!(snapshots.iter().all(|s| s.symbol != "TSLA"));
    }

    #[tokio::test]
    async fn test_reset_failed_makes_symbols_pending() {
        let tmp = tempfile::tempdir().unwrap();
        let (campaign, _) = campaign(tmp.path(), universe(), backend());

        campaign.fetch_next_batch(2).await.unwrap();
        assert_eq!(campaign.reset_failed().unwrap(), 1);

        let pending: Vec<String> = campaign.pending().iter().map(|s| s.to_string()).collect();
        assert_eq!(pending, vec!["TSLA", "NVDA", "MSFT", "AMZN"]);
    }

    #[tokio::test]
    async fn test_corrupt_progress_restarts_campaign() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("progress.json"), "[[[").unwrap();

        let (campaign, _) = campaign(tmp.path(), universe(), backend());
        assert_eq!(campaign.pending().len(), 5);
        assert_eq!(campaign.status().completion_rate, 0.0);
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (campaign, _) = campaign(tmp.path(), universe(), backend());
        assert!(campaign.fetch_next_batch(0).await.is_err());
    }
}
