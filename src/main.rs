use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use endpoint_check::cache::ErrorCache;
use endpoint_check::endpoint::{dedup, normalize_lines};
use endpoint_check::fetch;
use endpoint_check::prober::{self, http_probe};
use endpoint_check::summary::Aggregator;

/// endpoint-check — concurrent HTTP liveness checker with a persistent error cache.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "endpoint-check",
    version,
    about = "Concurrent HTTP liveness checker for large endpoint lists with a persistent error cache.",
    long_about = None
)]
struct Cli {
    /// Server list source: an http(s) URL or a local file path.
    #[arg(long, default_value = "servers.txt")]
    source: String,

    /// Treat the fetched source as a pointer whose first line is the real list URL.
    #[arg(long, default_value_t = false)]
    indirect: bool,

    /// Port assumed for lines without an explicit port.
    #[arg(long = "default-port", default_value_t = 80)]
    default_port: u16,

    /// Per-probe HTTP timeout in seconds.
    #[arg(long = "timeout-secs", default_value_t = 3)]
    timeout_secs: u64,

    /// Max concurrent probes in flight.
    #[arg(long = "max-workers", default_value_t = 150)]
    max_workers: usize,

    /// How many recent active/error entries the live view keeps.
    #[arg(long, default_value_t = 15)]
    recent: usize,

    /// Error cache file path.
    #[arg(long = "cache-file", default_value = "error_cache.json")]
    cache_file: PathBuf,

    /// Where to write the active endpoints, one host:port per line.
    #[arg(long, default_value = "results.txt")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    println!("endpoint-check configuration:");
    println!("  source       : {}", cli.source);
    println!("  indirect     : {}", cli.indirect);
    println!("  default_port : {}", cli.default_port);
    println!("  timeout_secs : {}", cli.timeout_secs);
    println!("  max_workers  : {}", cli.max_workers);
    println!("  recent       : {}", cli.recent);
    println!("  cache_file   : {}", cli.cache_file.display());
    println!("  output       : {}", cli.output.display());

    let cache = ErrorCache::load(&cli.cache_file);
    if !cache.is_empty() {
        println!(
            "Found {} cached error servers that will be skipped",
            cache.len()
        );
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    // A fetch failure aborts the run before any probing; no files are written.
    println!("Fetching server list...");
    let lines = fetch::fetch_lines(&client, &cli.source, cli.indirect).await?;

    let endpoints = normalize_lines(&lines, cli.default_port);
    let original = endpoints.len();
    if original == 0 {
        println!("No servers to check.");
        return Ok(());
    }

    let (unique, duplicates) = dedup(endpoints);
    if duplicates > 0 {
        println!("Removed {duplicates} duplicate entries");
    }

    let (to_check, skipped) = cache.filter_skip(unique);
    if skipped > 0 {
        println!("Skipped {skipped} servers from error cache");
    }
    if to_check.is_empty() {
        println!("All servers are in error cache. Nothing to check.");
        return Ok(());
    }

    println!("Checking {} servers...\n", to_check.len());

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        eprintln!("Cancellation requested, letting in-flight probes finish...");
        cancel_ctrlc.cancel();
    });

    let mut agg = Aggregator::new(original, duplicates, skipped, to_check.len(), cli.recent);
    let probe_client = client.clone();
    let mut outcomes = prober::run_probes(to_check, cli.max_workers, cancel, move |ep| {
        http_probe(probe_client.clone(), ep)
    });

    // Single-consumer drain: all summary mutation happens here, in completion
    // order, so no outcome is ever double-counted or lost.
    while let Some(outcome) = outcomes.recv().await {
        if outcome.alive {
            println!("+ {} is active", outcome.endpoint);
        } else {
            println!(
                "- {} failed: {}",
                outcome.endpoint,
                outcome.reason.as_deref().unwrap_or("unknown")
            );
        }
        agg.record(&outcome);
        println!("  {}", agg.progress_line());
    }

    println!("\n{}", agg.render());

    if let Err(e) = cache.save(agg.new_failures()) {
        eprintln!("Warning: could not save cache: {e}");
    } else {
        println!(
            "Updated error cache with {} new errors",
            agg.new_failures().len()
        );
    }

    if !agg.active_endpoints().is_empty() {
        match write_results(&cli.output, agg.active_endpoints()) {
            Ok(()) => println!(
                "Saved {} active servers to {}",
                agg.active_endpoints().len(),
                cli.output.display()
            ),
            Err(e) => eprintln!("Warning: failed to save results: {e}"),
        }
    }

    Ok(())
}

fn write_results(path: &Path, active: &[String]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for endpoint in active {
        writeln!(file, "{endpoint}")?;
    }
    Ok(())
}
