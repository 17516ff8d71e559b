use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::endpoint::Endpoint;

/// Tri-state result of one liveness check: alive, or dead with a reason.
/// Produced exactly once per probed endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub endpoint: Endpoint,
    pub alive: bool,
    pub reason: Option<String>,
}

impl ProbeOutcome {
    pub fn alive(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            alive: true,
            reason: None,
        }
    }

    pub fn dead(endpoint: Endpoint, reason: impl Into<String>) -> Self {
        Self {
            endpoint,
            alive: false,
            reason: Some(reason.into()),
        }
    }
}

/// Probe one endpoint with a single plain-HTTP GET.
///
/// Status 200 means alive; any other status or any network-level failure
/// (refused connection, timeout, DNS) means dead with a short reason. One
/// attempt per endpoint per run, no retries. The client carries the fixed
/// request timeout and is shared across all probes for connection reuse.
pub async fn http_probe(client: reqwest::Client, endpoint: Endpoint) -> ProbeOutcome {
    match client.get(endpoint.http_url()).send().await {
        Ok(resp) => {
            let status = resp.status();
            if status.as_u16() == 200 {
                ProbeOutcome::alive(endpoint)
            } else {
                ProbeOutcome::dead(endpoint, format!("status {}", status.as_u16()))
            }
        }
        Err(e) => {
            let reason = if e.is_timeout() {
                "timeout".to_string()
            } else if e.is_connect() {
                "connect error".to_string()
            } else {
                format!("request error: {e}")
            };
            ProbeOutcome::dead(endpoint, reason)
        }
    }
}

/// Run `probe` over all endpoints with at most `max_workers` in flight.
///
/// Outcomes are delivered on the returned channel in completion order, so
/// faster probes surface sooner. Every submitted endpoint yields exactly one
/// outcome; a probe that panics is converted into a dead outcome rather than
/// aborting the run. Cancelling `cancel` stops submitting new probes and lets
/// in-flight ones finish or time out.
pub fn run_probes<P, F>(
    endpoints: Vec<Endpoint>,
    max_workers: usize,
    cancel: CancellationToken,
    probe: P,
) -> mpsc::Receiver<ProbeOutcome>
where
    P: Fn(Endpoint) -> F + Send + Sync + 'static,
    F: Future<Output = ProbeOutcome> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(max_workers.max(1));
    tokio::spawn(async move {
        let sem = Arc::new(Semaphore::new(max_workers.clamp(1, 5_000)));
        let probe = Arc::new(probe);
        let mut set = JoinSet::new();

        for ep in endpoints {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = sem.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };
            let tx = tx.clone();
            let probe = probe.clone();

            set.spawn(async move {
                let _permit = permit; // keep permit until the probe completes

                let outcome = match AssertUnwindSafe(probe(ep.clone())).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(_) => ProbeOutcome::dead(ep, "probe panicked"),
                };
                // Receiver dropping mid-run just discards remaining outcomes.
                let _ = tx.send(outcome).await;
            });
        }

        while set.join_next().await.is_some() {}
    });
    rx
}
