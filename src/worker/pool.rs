//! Worker Pool — the main processing loop: dequeue, lock,
//! load, download, OCR, parse, score, persist, route, publish, cleanup.
//! Loop shape, backoff-with-shutdown-interrupt, and logging style follow
//! the pack's `JobWorker::run`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::db::{DocumentRepo, DocumentStatus};
use crate::decision::DecisionRouter;
use crate::parsers;
use crate::queue::{CorrelationId, ProcessingResult, QueueSubstrate};
use crate::scoring;

use super::ocr::OcrEngine;

const POLL_BACKOFF: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Clone, Copy)]
pub struct WorkerConfig {
    pub lock_ttl: Duration,
    pub max_attempts: i32,
}

pub struct JobWorker {
    worker_id: usize,
    queue: QueueSubstrate,
    documents: DocumentRepo,
    blobs: Arc<dyn BlobStore>,
    ocr: Arc<dyn OcrEngine>,
    decision_router: DecisionRouter,
    config: WorkerConfig,
}

impl JobWorker {
    pub fn new(
        worker_id: usize,
        queue: QueueSubstrate,
        documents: DocumentRepo,
        blobs: Arc<dyn BlobStore>,
        ocr: Arc<dyn OcrEngine>,
        decision_router: DecisionRouter,
        config: WorkerConfig,
    ) -> Self {
        Self {
            worker_id,
            queue,
            documents,
            blobs,
            ocr,
            decision_router,
            config,
        }
    }

    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(worker_id = self.worker_id, "worker started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.poll_once().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = tokio::time::sleep(POLL_BACKOFF) => {},
                        _ = shutdown_rx.changed() => break,
                    }
                }
                Err(err) => {
                    tracing::error!(worker_id = self.worker_id, error = %err, "worker poll cycle failed, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {},
                        _ = shutdown_rx.changed() => break,
                    }
                }
            }
        }

        tracing::info!(worker_id = self.worker_id, "worker stopped");
    }

    /// One dequeue-and-process cycle. Returns `Ok(true)` if a queue item
    /// was claimed (regardless of how it was resolved), `Ok(false)` if
    /// the queue was empty.
    async fn poll_once(&self) -> anyhow::Result<bool> {
        let Some(item) = self.queue.dequeue().await? else {
            return Ok(false);
        };
        let document_id = item.document_id;

        // Step 2: acquire the per-document lock. Losing the race means
        // another worker already holds it (reaper recovery racing a live
        // holder); this item's processing-set entry is stale, clear it
        // and move on.
        if !self.queue.acquire_lock(document_id, self.config.lock_ttl).await? {
            tracing::debug!(worker_id = self.worker_id, %document_id, "lock held elsewhere, skipping");
            self.queue.mark_complete(document_id).await?;
            return Ok(true);
        }

        // Step 3: idempotency guard against double-enqueue after a
        // reaper recovery or a replayed request.
        let document = match self.documents.get(document_id).await? {
            Some(doc) if doc.status != DocumentStatus::Completed => doc,
            _ => {
                self.queue.mark_complete(document_id).await?;
                return Ok(true);
            }
        };

        // Step 4: correlation ID, generated fresh if this is the first
        // attempt, reused across retries of the same item.
        let correlation_id = match item.correlation_id {
            Some(id) => CorrelationId::from(id),
            None => {
                let id = CorrelationId::new();
                self.queue.set_correlation_id(document_id, id.into()).await?;
                id
            }
        };

        // Step 5: best-effort status transition; the lock, not this
        // write, is the mutual-exclusion primitive.
        self.documents.transition_to_processing(document.id).await?;

        let started_at = Instant::now();
        tracing::info!(worker_id = self.worker_id, %document_id, %correlation_id, "processing started");

        match self.process(&document).await {
            Ok((updated, score_result)) => {
                self.finish_success(&updated, &score_result, correlation_id, started_at).await;
            }
            Err(err) => {
                self.finish_failure(document_id, item.attempts, err, correlation_id).await?;
            }
        }

        Ok(true)
    }

    /// Steps 6-10: download, OCR, parse, score, persist. Any failure
    /// here is retryable.
    async fn process(
        &self,
        document: &crate::db::Document,
    ) -> anyhow::Result<(crate::db::Document, scoring::ScoreResult)> {
        let bytes = self.blobs.get(&document.blob_key).await?;
        let ocr_text = self.ocr.extract_text(&bytes).await?;
        let fields = parsers::parse(document.doc_type, &ocr_text);
        match &fields {
            parsers::ParsedFields::Ktp(f) => {
                tracing::debug!(
                    document_id = %document.id,
                    nik = %f.nik.as_deref().map(crate::mask::mask_nik).unwrap_or_default(),
                    "parsed KTP fields"
                );
            }
            parsers::ParsedFields::Npwp(f) => {
                tracing::debug!(
                    document_id = %document.id,
                    npwp = %f.npwp_number.as_deref().map(crate::mask::mask_npwp).unwrap_or_default(),
                    "parsed NPWP fields"
                );
            }
        }
        let score_result = scoring::score(&fields, &ocr_text);
        let decision = scoring::post_ocr_decision(score_result.score);

        self.documents
            .mark_completed(
                document.id,
                &ocr_text,
                parsers::to_json(&fields),
                score_result.score,
                decision.as_str(),
                match decision {
                    scoring::PostOcrDecision::AutoApproved => crate::db::VerificationStatus::AutoApproved,
                    scoring::PostOcrDecision::PendingManualReview => {
                        crate::db::VerificationStatus::PendingManualReview
                    }
                },
            )
            .await?;

        let updated = self
            .documents
            .get(document.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("document {} vanished after persisting result", document.id))?;

        Ok((updated, score_result))
    }

    /// Steps 11-13 on the success path. Routing/publish failures are
    /// logged but never reopen a document whose processing `status` is
    /// already `completed` — once OCR succeeds, the document is
    /// terminally completed even if escalation to the reviewer fails.
    async fn finish_success(
        &self,
        document: &crate::db::Document,
        score_result: &scoring::ScoreResult,
        correlation_id: CorrelationId,
        started_at: Instant,
    ) {
        let outcome = match self
            .decision_router
            .route_post_ocr(document, score_result, correlation_id)
            .await
        {
            Ok(record) => record.decision,
            Err(err) => {
                tracing::error!(document_id = %document.id, %correlation_id, error = %err, "decision routing failed after document was persisted as completed");
                "routing_failed".to_string()
            }
        };

        let result = ProcessingResult {
            document_id: document.id,
            correlation_id: correlation_id.into(),
            outcome,
            score: Some(score_result.score),
            processing_time_ms: started_at.elapsed().as_millis() as i64,
        };
        if let Err(err) = self.queue.publish_result(&result).await {
            tracing::warn!(document_id = %document.id, error = %err, "failed to publish processing result");
        }

        if let Err(err) = self.queue.mark_complete(document.id).await {
            tracing::error!(document_id = %document.id, error = %err, "failed to clear queue state after successful processing");
        }

        tracing::info!(
            document_id = %document.id,
            %correlation_id,
            score = score_result.score,
            elapsed_ms = started_at.elapsed().as_millis() as i64,
            "processing completed"
        );
    }

    /// Failure handling: up to `max_attempts - 1` retries
    /// with backoff `3 * 3^(attempts-1)` seconds, then a terminal
    /// `failed` outcome.
    async fn finish_failure(
        &self,
        document_id: Uuid,
        attempts_before: i32,
        err: anyhow::Error,
        correlation_id: CorrelationId,
    ) -> anyhow::Result<()> {
        let attempts = self.queue.increment_attempts(document_id).await?;
        tracing::warn!(%document_id, %correlation_id, attempts, error = %err, "processing attempt failed");

        if attempts < self.config.max_attempts {
            let delay = Duration::from_secs(3u64.saturating_pow(attempts as u32));
            self.queue.schedule_retry(document_id, delay).await?;
            self.queue.release_lock(document_id).await?;
        } else {
            self.documents.mark_failed(document_id, &err.to_string()).await?;
            self.queue.mark_failed(document_id).await?;

            let result = ProcessingResult {
                document_id,
                correlation_id: correlation_id.into(),
                outcome: "failed".to_string(),
                score: None,
                processing_time_ms: 0,
            };
            if let Err(publish_err) = self.queue.publish_result(&result).await {
                tracing::warn!(%document_id, error = %publish_err, "failed to publish failure result");
            }

            tracing::error!(%document_id, %correlation_id, attempts, "processing failed permanently, max attempts exceeded");
        }

        Ok(())
    }

    pub fn attempt_backoff_preview() -> [Duration; 2] {
        // 3 * 3^(1-1), 3 * 3^(2-1) = 3s, 9s — documents the formula used
        // by `finish_failure` without re-deriving it in a doc comment.
        [Duration::from_secs(3), Duration::from_secs(9)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_formula_matches_spec_examples() {
        let backoffs = JobWorker::attempt_backoff_preview();
        assert_eq!(backoffs[0], Duration::from_secs(3));
        assert_eq!(backoffs[1], Duration::from_secs(9));
    }
}
