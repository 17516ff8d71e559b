use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::prober::ProbeOutcome;

/// Running tallies for one checking run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub original: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub to_check: usize,
    pub checked: usize,
    pub active: usize,
    pub failed: usize,
}

/// Consumes the outcome stream and maintains the live summary: counts, the
/// capped recent-activity views, the full active list for the results file,
/// and the set of newly failed endpoints for the cache merge.
///
/// `record` is the single mutation point; the driver drains outcomes from one
/// channel, so updates never interleave.
#[derive(Debug)]
pub struct Aggregator {
    summary: RunSummary,
    recent_cap: usize,
    recent_active: VecDeque<String>,
    recent_failed: VecDeque<(String, String)>,
    active_endpoints: Vec<String>,
    new_failures: HashSet<String>,
    started: Instant,
}

impl Aggregator {
    pub fn new(original: usize, duplicates: usize, skipped: usize, to_check: usize, recent_cap: usize) -> Self {
        Self {
            summary: RunSummary {
                original,
                duplicates,
                skipped,
                to_check,
                ..RunSummary::default()
            },
            recent_cap,
            recent_active: VecDeque::new(),
            recent_failed: VecDeque::new(),
            active_endpoints: Vec::new(),
            new_failures: HashSet::new(),
            started: Instant::now(),
        }
    }

    /// Fold one outcome into the summary. Each outcome is counted exactly
    /// once; recency buffers evict their oldest entry beyond the cap.
    pub fn record(&mut self, outcome: &ProbeOutcome) {
        let canonical = outcome.endpoint.canonical();
        self.summary.checked += 1;
        if outcome.alive {
            self.summary.active += 1;
            push_capped(
                &mut self.recent_active,
                format!("{}  {}", clock_stamp(), canonical),
                self.recent_cap,
            );
            self.active_endpoints.push(canonical);
        } else {
            self.summary.failed += 1;
            let reason = outcome.reason.clone().unwrap_or_else(|| "unknown".into());
            push_capped(
                &mut self.recent_failed,
                (canonical.clone(), reason),
                self.recent_cap,
            );
            self.new_failures.insert(canonical);
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Display-only view of the most recent active endpoints, oldest first.
    pub fn recent_active(&self) -> impl Iterator<Item = &str> {
        self.recent_active.iter().map(String::as_str)
    }

    /// Display-only view of the most recent failures, oldest first.
    pub fn recent_failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.recent_failed.iter().map(|(s, r)| (s.as_str(), r.as_str()))
    }

    /// Every endpoint found alive this run, in completion order. Unlike the
    /// recency views this list is never truncated.
    pub fn active_endpoints(&self) -> &[String] {
        &self.active_endpoints
    }

    /// Canonical strings of endpoints that failed this run, for the cache merge.
    pub fn new_failures(&self) -> &HashSet<String> {
        &self.new_failures
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Compact one-line view of the running counts, published after every
    /// recorded outcome so progress is visible mid-run.
    pub fn progress_line(&self) -> String {
        let s = &self.summary;
        format!(
            "checked {}/{}  active {}  errors {}",
            s.checked, s.to_check, s.active, s.failed
        )
    }

    /// Current summary block for display; called after updates to publish
    /// fresh state.
    pub fn render(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        out.push_str(&format!("Original servers   : {}\n", s.original));
        out.push_str(&format!("Duplicates removed : {}\n", s.duplicates));
        out.push_str(&format!("Skipped (cached)   : {}\n", s.skipped));
        out.push_str(&format!(
            "Checked            : {}/{}\n",
            s.checked, s.to_check
        ));
        out.push_str(&format!("Active             : {}\n", s.active));
        out.push_str(&format!("New errors         : {}\n", s.failed));
        out.push_str(&format!(
            "Elapsed            : {:.2}s\n",
            self.elapsed().as_secs_f64()
        ));

        out.push_str(&format!("\nRecent active ({}):\n", s.active));
        if self.recent_active.is_empty() {
            out.push_str("  (none yet)\n");
        }
        if s.active > self.recent_active.len() {
            out.push_str(&format!(
                "  ... +{} more\n",
                s.active - self.recent_active.len()
            ));
        }
        for line in &self.recent_active {
            out.push_str(&format!("  {line}\n"));
        }

        out.push_str(&format!("\nRecent errors ({}):\n", s.failed));
        if self.recent_failed.is_empty() {
            out.push_str("  (none yet)\n");
        }
        if s.failed > self.recent_failed.len() {
            out.push_str(&format!(
                "  ... +{} more\n",
                s.failed - self.recent_failed.len()
            ));
        }
        for (srv, err) in &self.recent_failed {
            out.push_str(&format!("  {srv} -> {err}\n"));
        }
        out
    }
}

fn push_capped<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    buf.push_back(item);
    while buf.len() > cap {
        buf.pop_front();
    }
}

fn clock_stamp() -> String {
    let fmt = format_description!("[hour]:[minute]:[second]");
    OffsetDateTime::now_utc()
        .format(&fmt)
        .unwrap_or_else(|_| String::from("00:00:00"))
}
