//! Periodic retry-queue drainer: pops queued envelopes while
//! the circuit is CLOSED and re-attempts delivery, up to
//! `max_envelope_attempts` envelope-level tries before giving up and
//! recording a terminal forwarding failure on the ManualReview. Loop
//! shape and shutdown handling follow the pack's `JobWorker::run`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::db::ManualReviewRepo;

use super::circuit::{BreakerState, CircuitBreaker};
use super::client::HttpReviewForwarder;
use super::retry_queue::RetryQueue;

pub struct RetryDrainer {
    forwarder: Arc<HttpReviewForwarder>,
    breaker: Arc<CircuitBreaker>,
    retry_queue: RetryQueue,
    manual_reviews: ManualReviewRepo,
    max_envelope_attempts: u32,
    interval: Duration,
}

impl RetryDrainer {
    pub fn new(
        forwarder: Arc<HttpReviewForwarder>,
        manual_reviews: ManualReviewRepo,
        max_envelope_attempts: u32,
        interval: Duration,
    ) -> Self {
        let breaker = forwarder.breaker();
        let retry_queue = forwarder.retry_queue();
        Self {
            forwarder,
            breaker,
            retry_queue,
            manual_reviews,
            max_envelope_attempts,
            interval,
        }
    }

    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!("forwarder retry drainer started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            if let Err(err) = self.drain_once().await {
                tracing::error!(error = %err, "forwarder retry drain pass failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::info!("forwarder retry drainer stopped");
    }

    async fn drain_once(&self) -> anyhow::Result<()> {
        if self.breaker.state().await != BreakerState::Closed {
            return Ok(());
        }

        for queued in self.retry_queue.list_all().await? {
            match self.forwarder.post_once(&queued.envelope).await {
                Ok(ticket_id) => {
                    self.breaker.record_success().await;
                    if let Some(ticket_id) = ticket_id {
                        if let Err(err) = self
                            .manual_reviews
                            .set_ticket_id(queued.envelope.review_id, &ticket_id)
                            .await
                        {
                            tracing::warn!(review_id = %queued.envelope.review_id, error = %err, "failed to persist reviewer ticket id");
                        }
                    }
                    self.retry_queue.remove(queued.id).await?;
                    tracing::info!(review_id = %queued.envelope.review_id, "forwarder retry queue drained envelope");
                }
                Err(err) => {
                    self.breaker.record_failure().await;
                    let attempt = self.retry_queue.increment_attempt(queued.id).await?;
                    if attempt as u32 >= self.max_envelope_attempts {
                        tracing::error!(
                            review_id = %queued.envelope.review_id,
                            attempt,
                            error = %err,
                            "forwarder retry queue envelope exhausted, recording terminal failure"
                        );
                        self.manual_reviews
                            .set_forwarding_failed(
                                queued.envelope.review_id,
                                &format!("forwarding failed after {attempt} envelope attempts: {err}"),
                            )
                            .await?;
                        self.retry_queue.remove(queued.id).await?;
                    } else {
                        tracing::warn!(review_id = %queued.envelope.review_id, attempt, error = %err, "forwarder retry queue attempt failed, will retry");
                    }

                    // The circuit just opened on this failure; stop
                    // draining the rest of this pass rather than burning
                    // through every remaining envelope against a dead
                    // reviewer.
                    if self.breaker.state().await != BreakerState::Closed {
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Exercising a full drain pass requires a Postgres-backed
    // `RetryQueue`; covered by the circuit breaker's own unit tests
    // (`forwarder::circuit::tests`) and the Decision Router's fake in
    // `decision::tests` for the escalation half of this path.
}
