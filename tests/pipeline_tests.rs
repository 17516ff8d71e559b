//! End-to-end pipeline runs with a stub prober: normalize, dedup, cache
//! filter, bounded concurrent probing, aggregation, cache merge.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use endpoint_check::cache::ErrorCache;
use endpoint_check::endpoint::{dedup, normalize_lines, Endpoint};
use endpoint_check::prober::{run_probes, ProbeOutcome};
use endpoint_check::summary::Aggregator;

/// Stub prober: alive for the listed endpoints, dead (connect error) for the
/// rest. Records which endpoints were actually probed.
fn stub(
    alive: &[&str],
    probed: Arc<Mutex<HashSet<String>>>,
) -> impl Fn(Endpoint) -> futures::future::Ready<ProbeOutcome> + Send + Sync + 'static {
    let alive: HashSet<String> = alive.iter().map(|s| s.to_string()).collect();
    move |ep: Endpoint| {
        let canonical = ep.canonical();
        probed.lock().unwrap().insert(canonical.clone());
        let outcome = if alive.contains(&canonical) {
            ProbeOutcome::alive(ep)
        } else {
            ProbeOutcome::dead(ep, "connect error")
        };
        futures::future::ready(outcome)
    }
}

async fn run_pipeline(
    raw: &[&str],
    cache_path: &Path,
    alive: &[&str],
) -> (Aggregator, HashSet<String>) {
    let lines: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
    let endpoints = normalize_lines(&lines, 80);
    let original = endpoints.len();
    let (unique, duplicates) = dedup(endpoints);

    let cache = ErrorCache::load(cache_path);
    let (to_check, skipped) = cache.filter_skip(unique);

    let probed = Arc::new(Mutex::new(HashSet::new()));
    let mut agg = Aggregator::new(original, duplicates, skipped, to_check.len(), 15);
    let mut rx = run_probes(
        to_check,
        4,
        CancellationToken::new(),
        stub(alive, probed.clone()),
    );
    while let Some(outcome) = rx.recv().await {
        agg.record(&outcome);
    }

    cache.save(agg.new_failures()).unwrap();
    let probed = probed.lock().unwrap().clone();
    (agg, probed)
}

fn cache_servers(path: &Path) -> HashSet<String> {
    let text = fs::read_to_string(path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    json["error_servers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn full_run_with_empty_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("error_cache.json");

    let raw = ["1.1.1.1:80", "1.1.1.1:80", "bad:port", "2.2.2.2:80"];
    let (agg, _) = run_pipeline(&raw, &cache_path, &["1.1.1.1:80"]).await;

    let s = agg.summary();
    assert_eq!(s.original, 3); // "bad:port" is dropped during normalization
    assert_eq!(s.duplicates, 1);
    assert_eq!(s.skipped, 0);
    assert_eq!(s.checked, 2);
    assert_eq!(s.active, 1);
    assert_eq!(s.failed, 1);
    assert_eq!(s.active + s.failed, s.checked);

    assert_eq!(agg.active_endpoints(), &["1.1.1.1:80".to_string()][..]);
    assert_eq!(
        cache_servers(&cache_path),
        HashSet::from(["2.2.2.2:80".to_string()])
    );
}

#[tokio::test]
async fn cached_failure_is_skipped_and_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("error_cache.json");

    // Pre-seed the cache with a known-bad endpoint.
    let seed = ErrorCache::load(&cache_path);
    seed.save(&HashSet::from(["2.2.2.2:80".to_string()]))
        .unwrap();

    let raw = ["1.1.1.1:80", "1.1.1.1:80", "bad:port", "2.2.2.2:80"];
    let (agg, probed) = run_pipeline(&raw, &cache_path, &["1.1.1.1:80"]).await;

    let s = agg.summary();
    assert_eq!(s.skipped, 1);
    assert_eq!(s.checked, 1);
    assert_eq!(s.active, 1);
    assert_eq!(s.failed, 0);

    // The cached endpoint was never probed and survives the save untouched.
    assert!(!probed.contains("2.2.2.2:80"));
    assert!(cache_servers(&cache_path).contains("2.2.2.2:80"));
}

#[tokio::test]
async fn results_file_lists_every_active_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("error_cache.json");
    let results_path = dir.path().join("results.txt");

    let raw = ["1.1.1.1:80", "3.3.3.3:8080", "2.2.2.2:80"];
    let (agg, _) = run_pipeline(&raw, &cache_path, &["1.1.1.1:80", "3.3.3.3:8080"]).await;

    let mut lines = String::new();
    for ep in agg.active_endpoints() {
        lines.push_str(ep);
        lines.push('\n');
    }
    fs::write(&results_path, &lines).unwrap();

    let written = fs::read_to_string(&results_path).unwrap();
    let got: HashSet<&str> = written.lines().collect();
    assert_eq!(got, HashSet::from(["1.1.1.1:80", "3.3.3.3:8080"]));
}
