//! HTTP client half of the Review Forwarder: POSTs escalated
//! documents to the external reviewer, with per-call retry/backoff and
//! the circuit breaker guarding every attempt. Calls that don't get
//! through — breaker open, or retries exhausted — fall back to the
//! persistent retry queue for the drainer to pick up later.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::decision::{ReviewEnvelope, ReviewForwarder};

use super::circuit::CircuitBreaker;
use super::retry_queue::RetryQueue;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_INLINE_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// The reviewer's acknowledgement body. `ticketId` is the reviewer's own
/// tracking id for the escalation; absent until the reviewer assigns one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewerAck {
    ticket_id: Option<String>,
}

pub struct HttpReviewForwarder {
    http: Client,
    breaker: Arc<CircuitBreaker>,
    retry_queue: RetryQueue,
    reviewer_api_url: String,
    reviewer_api_key: String,
}

impl HttpReviewForwarder {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        retry_queue: RetryQueue,
        reviewer_api_url: String,
        reviewer_api_key: String,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build reviewer HTTP client")?;
        Ok(Self {
            http,
            breaker,
            retry_queue,
            reviewer_api_url,
            reviewer_api_key,
        })
    }

    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        self.breaker.clone()
    }

    pub fn retry_queue(&self) -> RetryQueue {
        self.retry_queue.clone()
    }

    /// One POST `/reviews` attempt. Any non-2xx status or transport error
    /// counts as a failure for both the retry loop and the breaker.
    /// Returns the reviewer's own ticket id when the acknowledgement body
    /// carries one.
    pub async fn post_once(&self, envelope: &ReviewEnvelope) -> Result<Option<String>> {
        let response = self
            .http
            .post(format!("{}/reviews", self.reviewer_api_url))
            .bearer_auth(&self.reviewer_api_key)
            .json(envelope)
            .send()
            .await
            .context("reviewer request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("reviewer returned status {}", response.status());
        }

        let ack: ReviewerAck = response.json().await.unwrap_or_default();
        Ok(ack.ticket_id)
    }

    /// Up to `MAX_INLINE_ATTEMPTS` with exponential backoff (1 s, ×2,
    /// max 30 s) before giving up on this call and letting the caller
    /// fall back to the retry queue.
    async fn post_with_retry(&self, envelope: &ReviewEnvelope) -> Result<Option<String>> {
        let mut backoff = INITIAL_BACKOFF;
        let mut last_err = None;

        for attempt in 1..=MAX_INLINE_ATTEMPTS {
            match self.post_once(envelope).await {
                Ok(ticket_id) => return Ok(ticket_id),
                Err(err) => {
                    tracing::warn!(
                        review_id = %envelope.review_id,
                        attempt,
                        error = %err,
                        "reviewer POST attempt failed"
                    );
                    last_err = Some(err);
                    if attempt < MAX_INLINE_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("reviewer POST failed with no recorded error")))
    }
}

#[async_trait]
impl ReviewForwarder for HttpReviewForwarder {
    async fn submit(&self, envelope: ReviewEnvelope) -> Result<Option<String>> {
        if !self.breaker.allow_request().await {
            tracing::warn!(review_id = %envelope.review_id, "forwarder circuit open, queuing for retry");
            self.retry_queue.push(&envelope).await?;
            return Ok(None);
        }

        match self.post_with_retry(&envelope).await {
            Ok(ticket_id) => {
                self.breaker.record_success().await;
                Ok(ticket_id)
            }
            Err(err) => {
                self.breaker.record_failure().await;
                self.retry_queue.push(&envelope).await?;
                Err(err)
            }
        }
    }
}
