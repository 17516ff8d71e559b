use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::endpoint::Endpoint;

/// On-disk schema of the error cache file.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    error_servers: Vec<String>,
    #[serde(default)]
    last_update: String,
}

/// Cross-run persisted set of canonical endpoints known to fail.
///
/// Loaded once at startup, extended with this run's new failures, saved once
/// at the end. Entries are never expired here; a stale entry is only cleared
/// by editing or deleting the cache file.
#[derive(Debug)]
pub struct ErrorCache {
    path: PathBuf,
    servers: HashSet<String>,
}

impl ErrorCache {
    /// Load the cache from `path`. A missing file yields an empty cache; an
    /// unreadable or corrupt file yields an empty cache with a warning.
    /// Loading never fails the run.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let servers = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<CacheFile>(&text) {
                Ok(file) => file.error_servers.into_iter().collect(),
                Err(e) => {
                    eprintln!("Warning: could not parse cache {}: {e}", path.display());
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                eprintln!("Warning: could not read cache {}: {e}", path.display());
                HashSet::new()
            }
        };
        Self { path, servers }
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.servers.contains(canonical)
    }

    /// Partition `endpoints` into those to probe (absent from the cache) and
    /// a count of those skipped (present). The partition is exhaustive:
    /// `to_check.len() + skipped == endpoints.len()`.
    pub fn filter_skip(&self, endpoints: Vec<Endpoint>) -> (Vec<Endpoint>, usize) {
        let total = endpoints.len();
        let to_check: Vec<Endpoint> = endpoints
            .into_iter()
            .filter(|ep| !self.servers.contains(&ep.canonical()))
            .collect();
        let skipped = total - to_check.len();
        (to_check, skipped)
    }

    /// Persist the union of the loaded set and `new_failures`, stamped with
    /// the current UTC time. The union never removes entries, so saving the
    /// same failures twice is idempotent.
    pub fn save(&self, new_failures: &HashSet<String>) -> Result<()> {
        let mut servers: Vec<String> = self.servers.union(new_failures).cloned().collect();
        servers.sort();
        let file = CacheFile {
            error_servers: servers,
            last_update: now_stamp(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("failed to write cache {}", self.path.display()))
    }
}

/// Write via a sibling temp file and rename, so a crash mid-write leaves the
/// previous cache intact.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// `YYYY-MM-DD HH:MM:SS` in UTC, matching the cache schema.
pub fn now_stamp() -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::now_utc()
        .format(&fmt)
        .unwrap_or_else(|_| String::from("1970-01-01 00:00:00"))
}
