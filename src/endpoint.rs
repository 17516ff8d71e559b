use std::collections::HashSet;
use std::fmt;
use url::Url;

/// A canonical `host:port` endpoint. Identity (equality, hashing, cache
/// membership) is by the canonical textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Build an endpoint from parts. Empty hosts and port 0 are rejected.
    pub fn new(host: impl Into<String>, port: u16) -> Option<Self> {
        let host = host.into();
        if host.is_empty() || port == 0 {
            return None;
        }
        Some(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The canonical `host:port` form used as identity everywhere.
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The probe URL: a plain HTTP GET target regardless of how the source
    /// line spelled the endpoint.
    pub fn http_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Normalize one raw source line into an endpoint.
///
/// Rules, in order:
/// - blank lines are dropped;
/// - `http://` / `https://` lines are URL-parsed, taking the hostname and the
///   explicit port if present (else 80 / 443 by scheme);
/// - lines containing `:` split on the first colon, the right side must be a
///   valid port;
/// - anything else is a bare host probed on `default_port`.
///
/// Malformed lines yield `None` rather than an error; callers observe drops
/// only through the count difference.
pub fn normalize_line(raw: &str, default_port: u16) -> Option<Endpoint> {
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }

    if line.starts_with("http://") || line.starts_with("https://") {
        let parsed = Url::parse(line).ok()?;
        let host = parsed.host_str()?.to_string();
        let port = parsed.port_or_known_default()?;
        return Endpoint::new(host, port);
    }

    if let Some((host, port)) = line.split_once(':') {
        let host = host.trim();
        let port = port.trim();
        // Digits only: no sign, no whitespace inside. `parse` alone would
        // accept a leading `+`.
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let port: u16 = port.parse().ok()?;
        return Endpoint::new(host, port);
    }

    Endpoint::new(line, default_port)
}

/// Normalize a whole list of raw lines, silently dropping malformed ones.
pub fn normalize_lines(lines: &[String], default_port: u16) -> Vec<Endpoint> {
    lines
        .iter()
        .filter_map(|l| normalize_line(l, default_port))
        .collect()
}

/// Remove duplicate endpoints, preserving first-occurrence order.
///
/// Returns the unique sequence and the number of duplicates removed, so
/// `unique.len() + duplicates == input.len()` always holds.
pub fn dedup(endpoints: Vec<Endpoint>) -> (Vec<Endpoint>, usize) {
    let mut seen = HashSet::with_capacity(endpoints.len());
    let mut unique = Vec::with_capacity(endpoints.len());
    let mut duplicates = 0usize;
    for ep in endpoints {
        if seen.insert(ep.canonical()) {
            unique.push(ep);
        } else {
            duplicates += 1;
        }
    }
    (unique, duplicates)
}
