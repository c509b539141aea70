//! Delayed-retry sweeper: moves matured entries from the
//! queue's delayed set back onto the main list every
//! `RETRY_SWEEP_INTERVAL_SECS`. Separate task from the reaper — this one
//! runs far more often and does far less work per tick.

use std::time::Duration;

use tokio::sync::watch;

use crate::queue::QueueSubstrate;

pub async fn run(queue: QueueSubstrate, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    tracing::info!("retry sweep started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match queue.sweep_retries().await {
            Ok(0) => {}
            Ok(n) => tracing::debug!(matured = n, "retry sweep moved entries back to queue"),
            Err(err) => tracing::error!(error = %err, "retry sweep failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = shutdown_rx.changed() => break,
        }
    }

    tracing::info!("retry sweep stopped");
}
