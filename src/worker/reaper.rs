//! Stuck-job reaper. Runs independently of the worker loop on its own
//! interval; does not touch locks, which expire on their own TTL.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::db::DocumentRepo;
use crate::queue::QueueSubstrate;

pub struct Reaper {
    queue: QueueSubstrate,
    documents: DocumentRepo,
    interval: Duration,
    stuck_timeout: chrono::Duration,
    max_attempts: i32,
}

impl Reaper {
    pub fn new(
        queue: QueueSubstrate,
        documents: DocumentRepo,
        interval: Duration,
        stuck_timeout: Duration,
        max_attempts: i32,
    ) -> Self {
        Self {
            queue,
            documents,
            interval,
            stuck_timeout: chrono::Duration::from_std(stuck_timeout).unwrap_or_default(),
            max_attempts,
        }
    }

    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!("reaper started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            if let Err(err) = self.sweep().await {
                tracing::error!(error = %err, "reaper sweep failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::info!("reaper stopped");
    }

    async fn sweep(&self) -> anyhow::Result<()> {
        let older_than = Utc::now() - self.stuck_timeout;
        let stuck = self.queue.list_stuck(older_than).await?;

        for item in stuck {
            if item.attempts < self.max_attempts {
                tracing::warn!(document_id = %item.document_id, attempts = item.attempts, "reaper recovering stuck item");
                self.documents.reset_to_uploaded(item.document_id).await?;
                self.queue.requeue_stuck(item.document_id).await?;
            } else {
                tracing::error!(document_id = %item.document_id, attempts = item.attempts, "reaper giving up on stuck item, marking failed");
                self.documents
                    .mark_failed(item.document_id, "stuck in processing past max attempts")
                    .await?;
                self.queue.mark_failed(item.document_id).await?;
            }
        }

        Ok(())
    }
}
