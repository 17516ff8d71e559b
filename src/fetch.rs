use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Upstream fetches get their own generous timeout, independent of the short
/// per-probe timeout carried by the shared client.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetch the raw endpoint list from `source`: an `http(s)://` URL or a local
/// file path. With `indirect`, the fetched body is a pointer whose first
/// non-empty line is the URL of the actual list.
///
/// Any failure here is fatal to the run; no probing happens on a partial
/// fetch.
pub async fn fetch_lines(
    client: &reqwest::Client,
    source: &str,
    indirect: bool,
) -> Result<Vec<String>> {
    let text = if is_url(source) {
        let body = get_text(client, source).await?;
        if indirect {
            let list_url = body
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .context("pointer source is empty")?;
            get_text(client, list_url).await?
        } else {
            body
        }
    } else {
        fs::read_to_string(Path::new(source))
            .with_context(|| format!("failed to read server list file: {source}"))?
    };
    Ok(text.lines().map(str::to_string).collect())
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

async fn get_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .with_context(|| format!("failed to fetch server list from {url}"))?
        .error_for_status()
        .with_context(|| format!("server list fetch rejected by {url}"))?;
    resp.text()
        .await
        .with_context(|| format!("failed to read server list body from {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_local_file_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.txt");
        fs::write(&path, "1.1.1.1:80\n2.2.2.2\n").unwrap();
        let client = reqwest::Client::new();
        let lines = fetch_lines(&client, path.to_str().unwrap(), false)
            .await
            .unwrap();
        assert_eq!(lines, vec!["1.1.1.1:80", "2.2.2.2"]);
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let client = reqwest::Client::new();
        let err = fetch_lines(&client, "/nonexistent/servers.txt", false).await;
        assert!(err.is_err());
    }
}
