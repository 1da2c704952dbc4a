// SPDX-FileCopyrightText: 2026 Aina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling and the ingest drain that runs after the gateway stops.
//!
//! The worker finishes payloads it already acknowledged to Meta before the
//! process exits.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Resolves with the name of the first termination signal received.
async fn termination_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                return tokio::select! {
                    _ = tokio::signal::ctrl_c() => "SIGINT",
                    _ = sigterm.recv() => "SIGTERM",
                };
            }
            Err(e) => warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only"),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without any handler the process can only be killed; never resolve.
        warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

/// Token cancelled on SIGTERM or SIGINT. The server and the ingest worker
/// both watch it.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        let name = termination_signal().await;
        info!(signal = name, "shutdown requested");
        trigger.cancel();
    });
    token
}

/// Waits up to `timeout` for the ingest worker to drain its queue.
pub async fn drain_ingest(worker: JoinHandle<()>, timeout: Duration) {
    match tokio::time::timeout(timeout, worker).await {
        Ok(Ok(())) => info!("ingest worker drained"),
        Ok(Err(e)) => warn!(error = %e, "ingest worker ended abnormally"),
        Err(_) => warn!(
            timeout_secs = timeout.as_secs(),
            "timeout reached, queued webhook payloads abandoned"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn drain_finished_worker() {
        let worker = tokio::spawn(async {});
        drain_ingest(worker, Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn drain_gives_up_after_timeout() {
        let worker = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        drain_ingest(worker, Duration::from_millis(10)).await;
    }
}
