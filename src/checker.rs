use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::report::Report;
use crate::runner::{select_runner, ProbeError, TestContext};
use crate::sockets;
use crate::source;
use crate::types::{Socket, TestResult};

/// Full pipeline: acquire the list, decode it, test every socket.
///
/// Acquisition and decode errors abort before any probe is sent. Per-socket
/// failures never abort; they are counted in the returned [`Report`].
pub async fn run(config: &Config, cancel: CancellationToken) -> Result<Report> {
    let bytes = source::fetch_source(config).await?;
    let sockets = sockets::decode(&bytes)
        .with_context(|| format!("failed to decode socket list from {}", config.source))?;
    info!(count = sockets.len(), "loaded socket list");
    check_sockets(sockets, config.timeout, cancel).await
}

/// Test all sockets concurrently and aggregate their results.
///
/// One task per socket, each writing into its own channel. The channels are
/// merged into a single stream drained here by one collector. Returns only
/// after every socket has produced exactly one result and every worker has
/// been joined.
pub async fn check_sockets(
    sockets: Vec<Socket>,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<Report> {
    // No client-level timeout: each test's deadline bounds the request.
    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let total = sockets.len();
    debug!(total, "dispatching");
    let (receivers, workers) = dispatch(sockets, timeout, &cancel, &http);

    debug!(total, "collecting");
    let mut merged = merge(receivers);
    let mut report = Report::new();
    while let Some(result) = merged.recv().await {
        report.record(result);
    }

    for (socket, handle) in workers {
        if let Err(e) = handle.await {
            // The worker died before sending; its socket still gets a result.
            error!(id = %socket.id, "worker failed: {e}");
            report.record(TestResult::failed(
                socket,
                None,
                ProbeError::Aborted(e.to_string()),
            ));
        }
    }

    let report = report.freeze();
    info!(
        total = report.total,
        failed = report.failed,
        "run complete"
    );
    Ok(report)
}

type Worker = (Socket, JoinHandle<()>);

/// Spawn one test task per socket, each owning the sender of its own channel.
fn dispatch(
    sockets: Vec<Socket>,
    timeout: Duration,
    cancel: &CancellationToken,
    http: &reqwest::Client,
) -> (Vec<mpsc::Receiver<TestResult>>, Vec<Worker>) {
    let mut receivers = Vec::with_capacity(sockets.len());
    let mut workers = Vec::with_capacity(sockets.len());
    for socket in sockets {
        let (tx, rx) = mpsc::channel(1);
        let ctx = TestContext::new(cancel.clone(), timeout, http.clone());
        let runner = select_runner(&socket);
        let task_socket = socket.clone();
        let handle = tokio::spawn(async move {
            debug!(id = %task_socket.id, runner = runner.as_str(), "test start");
            let result = runner.run_test(&ctx, task_socket).await;
            debug!(id = %result.socket.id, pass = result.pass, "test done");
            // Receiver lives until the merge drains it.
            let _ = tx.send(result).await;
        });
        receivers.push(rx);
        workers.push((socket, handle));
    }
    (receivers, workers)
}

/// Merge `sources` into one receiver.
///
/// One forwarding task per source copies values through. The output closes
/// once, after a join over all forwarders, i.e. after every source closed.
pub fn merge<T: Send + 'static>(sources: Vec<mpsc::Receiver<T>>) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(sources.len().max(1));
    let mut forwarders = JoinSet::new();
    for mut src in sources {
        let tx = tx.clone();
        forwarders.spawn(async move {
            while let Some(v) = src.recv().await {
                if tx.send(v).await.is_err() {
                    break;
                }
            }
        });
    }
    tokio::spawn(async move {
        while forwarders.join_next().await.is_some() {}
        drop(tx);
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merge_yields_every_value_then_closes() {
        let mut receivers = Vec::new();
        let mut senders = Vec::new();
        for _ in 0..16 {
            let (tx, rx) = mpsc::channel(4);
            senders.push(tx);
            receivers.push(rx);
        }
        let mut out = merge(receivers);
        for (i, tx) in senders.into_iter().enumerate() {
            tokio::spawn(async move {
                tx.send(i * 2).await.unwrap();
                tx.send(i * 2 + 1).await.unwrap();
            });
        }
        let mut got = Vec::new();
        while let Some(v) = out.recv().await {
            got.push(v);
        }
        got.sort_unstable();
        assert_eq!(got, (0..32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn merge_of_nothing_closes_immediately() {
        let mut out = merge::<u8>(Vec::new());
        assert_eq!(out.recv().await, None);
    }

    #[tokio::test]
    async fn empty_socket_list_is_an_empty_report() {
        let report = check_sockets(Vec::new(), Duration::from_secs(1), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.failed, 0);
        assert!(report.results.is_empty());
    }
}
