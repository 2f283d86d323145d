/// Edge case tests for the file-backed response cache
///
/// These tests cover:
/// - Round trip and overwrite
/// - TTL expiry under simulated time
/// - Self-healing reads of corrupt entries
/// - Stats and bulk clearing
/// - Foreign files in the cache directory
use serde_json::json;
use signal_core::{ManualClock, SymbolUniverse};
use signal_data_services::{CacheConfig, CacheKey, ResponseCache};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn open(dir: &Path, clock: Arc<ManualClock>) -> ResponseCache {
    ResponseCache::with_clock(
        CacheConfig {
            dir: dir.to_path_buf(),
            default_ttl_seconds: 3600,
        },
        clock,
    )
    .expect("cache dir")
}

#[cfg(test)]
mod cache_lifecycle {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("cache");
        let _cache = open(&nested, Arc::new(ManualClock::default()));
        assert!(nested.is_dir());
    }

    #[test]
    fn test_overwrite_keeps_last_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = open(tmp.path(), Arc::new(ManualClock::default()));
        let key = CacheKey::prompt("AAPL news", Some("stock_analyzer"));

        cache.set(&key, &json!({"v": 1}), None);
        cache.set(&key, &json!({"v": 2}), None);

        assert_eq!(cache.get(&key), Some(json!({"v": 2})));
        assert_eq!(cache.stats().total_files, 1);
    }

    #[test]
    fn test_ttl_zero_expires_after_clock_moves() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let cache = open(tmp.path(), clock.clone());
        let key = CacheKey::prompt("short lived", None);

        assert!(cache.set(&key, &json!("x"), Some(0)));
        clock.advance(Duration::milliseconds(1));

        assert_eq!(cache.get(&key), None);
        assert!(!cache.path_for(&key).exists());
        assert_eq!(cache.stats().total_files, 0);
    }

    #[test]
    fn test_default_ttl_applies() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let cache = open(tmp.path(), clock.clone());
        let key = CacheKey::prompt("hourly", None);

        cache.set(&key, &json!(true), None);
        clock.advance(Duration::seconds(3600));
        assert_eq!(cache.get(&key), Some(json!(true)));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn test_symbol_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = open(tmp.path(), Arc::new(ManualClock::default()));
        let universe = SymbolUniverse::default();
        let aapl = universe.resolve(" aapl ").unwrap();

        let key = CacheKey::symbol(&aapl);
        assert_eq!(key.text, "stock_AAPL");

        cache.set(&key, &json!({"symbol": "AAPL"}), None);
        assert_eq!(cache.get(&CacheKey::symbol(&aapl)), Some(json!({"symbol": "AAPL"})));
        // a prompt that happens to equal the symbol key shares the entry
        assert_eq!(cache.get(&CacheKey::prompt("stock_AAPL", None)), Some(json!({"symbol": "AAPL"})));
    }
}

#[cfg(test)]
mod cache_corruption {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_corrupt_entry_self_heals() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = open(tmp.path(), Arc::new(ManualClock::default()));
        let key = CacheKey::prompt("p", None);

        cache.set(&key, &json!({"ok": 1}), None);
        fs::write(cache.path_for(&key), "{\"response\": ").unwrap();

        assert_eq!(cache.stats().expired_files, 1);
        assert_eq!(cache.get(&key), None);
        assert!(!cache.path_for(&key).exists());
        assert_eq!(cache.stats().total_files, 0);
    }

    #[test]
    fn test_entry_missing_required_fields_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = open(tmp.path(), Arc::new(ManualClock::default()));
        let key = CacheKey::prompt("p", None);

        fs::write(cache.path_for(&key), r#"{"response": 1}"#).unwrap();
        assert_eq!(cache.get(&key), None);
        assert!(!cache.path_for(&key).exists());
    }

    #[test]
    fn test_clear_expired_counts_corrupt_and_stale() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let cache = open(tmp.path(), clock.clone());

        cache.set(&CacheKey::prompt("stale", None), &json!(1), Some(10));
        cache.set(&CacheKey::prompt("fresh", None), &json!(2), Some(1000));
        fs::write(tmp.path().join("garbage.json"), "nope").unwrap();

        clock.advance(Duration::seconds(60));

        let stats = cache.stats();
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.expired_files, 2);
        assert_eq!(stats.active_files, 1);
        assert!(stats.total_size > 0);

        assert_eq!(cache.clear_expired(), 2);
        assert_eq!(cache.get(&CacheKey::prompt("fresh", None)), Some(json!(2)));
    }

    #[test]
    fn test_non_json_files_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = open(tmp.path(), Arc::new(ManualClock::default()));
        fs::write(tmp.path().join("notes.txt"), "keep me").unwrap();

        cache.set(&CacheKey::prompt("p", None), &json!(1), None);
        assert_eq!(cache.stats().total_files, 1);

        assert!(cache.clear_all());
        assert_eq!(cache.stats().total_files, 0);
        assert!(tmp.path().join("notes.txt").exists());
    }
}
