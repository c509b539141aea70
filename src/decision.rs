//! Decision Router — the thin layer exposing both
//! verification pathways, and the User `verification_status` join rule
//! that every document outcome feeds back into.
//!
//! The Worker Pool calls `route_post_ocr` right after persisting a
//! freshly-scored document; HTTP handlers call `evaluate` against an
//! already-`completed` document. Both are idempotent with respect to a
//! document that is already terminal.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    Document, DocumentRepo, DocumentType, ManualReview, ManualReviewRepo, UserRepo, VerificationStatus,
};
use crate::parsers;
use crate::queue::CorrelationId;
use crate::scoring::{self, ExplicitDecision, PostOcrDecision, ScoreResult};

/// Outbound payload the Forwarder POSTs to the reviewer. Kept
/// here, next to the only two call sites that build one, rather than in
/// the forwarder module, so the wire shape and the decisions that
/// produce it stay visibly coupled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEnvelope {
    pub review_id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub document_type: String,
    pub parsed_data: serde_json::Value,
    pub ocr_text: String,
    pub score: i32,
    pub decision: String,
    pub reasons: Vec<String>,
    pub callback_url: String,
    pub correlation_id: Uuid,
}

/// Narrow seam between the Decision Router and the Review Forwarder.
/// `submit` is expected to return quickly: either the outbound POST
/// succeeded, or the envelope was handed to the Forwarder's own retry
/// queue. Either way the ManualReview stays `pending` until a callback
/// or the drainer's terminal-failure path changes it. The `Option<String>`
/// on success is the reviewer's own ticket id, when the reviewer returns
/// one synchronously; `None` means it will arrive later, via the drainer
/// or a callback.
#[async_trait]
pub trait ReviewForwarder: Send + Sync {
    async fn submit(&self, envelope: ReviewEnvelope) -> Result<Option<String>>;
}

/// Result of either decision pathway, shaped for the
/// `POST /verification/evaluate` response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    pub document_id: Uuid,
    pub score: i32,
    pub decision: String,
    pub verification_status: VerificationStatus,
    pub review_id: Option<Uuid>,
    pub reasons: Vec<String>,
}

#[derive(Clone)]
pub struct DecisionRouter {
    documents: DocumentRepo,
    manual_reviews: ManualReviewRepo,
    users: UserRepo,
    forwarder: Arc<dyn ReviewForwarder>,
    reviewer_callback_url: String,
}

impl DecisionRouter {
    pub fn new(
        documents: DocumentRepo,
        manual_reviews: ManualReviewRepo,
        users: UserRepo,
        forwarder: Arc<dyn ReviewForwarder>,
        reviewer_callback_url: String,
    ) -> Self {
        Self {
            documents,
            manual_reviews,
            users,
            forwarder,
            reviewer_callback_url,
        }
    }

    /// Worker Pool step 11: apply the conservative post-OCR policy to a
    /// document that has just been persisted as `completed` (step 10).
    /// `score_result` must be the same one the worker already wrote to
    /// `ai_score`/`result_json`; this call never re-scores.
    pub async fn route_post_ocr(
        &self,
        document: &Document,
        score_result: &ScoreResult,
        correlation_id: CorrelationId,
    ) -> Result<EvaluationRecord> {
        let decision = scoring::post_ocr_decision(score_result.score);
        let verification_status = match decision {
            PostOcrDecision::AutoApproved => VerificationStatus::AutoApproved,
            PostOcrDecision::PendingManualReview => VerificationStatus::PendingManualReview,
        };

        self.documents
            .set_verification_status(document.id, verification_status)
            .await
            .context("failed to persist post-OCR verification status")?;

        let review_id = if decision == PostOcrDecision::PendingManualReview {
            Some(
                self.escalate(document, score_result, decision.as_str(), correlation_id)
                    .await?,
            )
        } else {
            None
        };

        self.recompute_and_persist_user_status(document.user_id).await?;

        Ok(EvaluationRecord {
            document_id: document.id,
            score: score_result.score,
            decision: decision.as_str().to_string(),
            verification_status,
            review_id,
            reasons: score_result.reasons.clone(),
        })
    }

    /// `POST /verification/evaluate`: requires a `completed`
    /// document; re-derives parsed fields from the already-persisted
    /// `result_json` rather than re-running OCR. Idempotent: a document
    /// already in a terminal `verification_status` returns the stored
    /// outcome untouched.
    pub async fn evaluate(
        &self,
        document: &Document,
        threshold_auto_approve: i32,
        threshold_auto_reject: i32,
    ) -> Result<EvaluationRecord> {
        if document.verification_status.is_terminal() {
            return Ok(self.stored_outcome(document));
        }

        let result_json = document
            .result_json
            .clone()
            .context("completed document missing result_json")?;
        let ocr_text = document.ocr_text.clone().unwrap_or_default();
        let fields = parsers::from_json(document.doc_type, &result_json)
            .context("failed to rebuild parsed fields from result_json")?;
        let score_result = scoring::score(&fields, &ocr_text);

        let decision = scoring::explicit_decision(
            score_result.score,
            threshold_auto_approve,
            threshold_auto_reject,
        );
        let verification_status = match decision {
            ExplicitDecision::AutoApprove => VerificationStatus::AutoApproved,
            ExplicitDecision::AutoReject => VerificationStatus::AutoRejected,
            ExplicitDecision::NeedsReview => VerificationStatus::PendingManualReview,
        };

        self.documents
            .set_verification_status(document.id, verification_status)
            .await
            .context("failed to persist explicit verification status")?;

        let review_id = if decision == ExplicitDecision::NeedsReview {
            Some(
                self.escalate(
                    document,
                    &score_result,
                    decision.as_str(),
                    CorrelationId::new(),
                )
                .await?,
            )
        } else {
            None
        };

        self.recompute_and_persist_user_status(document.user_id).await?;

        Ok(EvaluationRecord {
            document_id: document.id,
            score: score_result.score,
            decision: decision.as_str().to_string(),
            verification_status,
            review_id,
            reasons: score_result.reasons,
        })
    }

    /// `POST /verification/{docId}/escalate`: force escalation
    /// regardless of score, skipping straight to `pending_manual_review`.
    /// A document that already has an active ManualReview returns it
    /// rather than creating a second one.
    pub async fn force_escalate(&self, document: &Document) -> Result<ManualReview> {
        if let Some(existing) = self.manual_reviews.get_active_for_document(document.id).await? {
            return Ok(existing);
        }

        let result_json = document.result_json.clone().unwrap_or(serde_json::Value::Null);
        let ocr_text = document.ocr_text.clone().unwrap_or_default();
        let reasons = vec!["forced escalation requested".to_string()];
        let score_result = ScoreResult {
            score: document.ai_score.unwrap_or(0),
            reasons,
        };

        self.documents
            .set_verification_status(document.id, VerificationStatus::PendingManualReview)
            .await
            .context("failed to persist forced escalation status")?;

        let review = self
            .escalate_with_payload(document, &score_result, "forced_escalation", CorrelationId::new(), result_json, ocr_text)
            .await?;

        self.recompute_and_persist_user_status(document.user_id).await?;
        Ok(review)
    }

    fn stored_outcome(&self, document: &Document) -> EvaluationRecord {
        EvaluationRecord {
            document_id: document.id,
            score: document.ai_score.unwrap_or(0),
            decision: document.ai_decision.clone().unwrap_or_default(),
            verification_status: document.verification_status,
            review_id: None,
            reasons: Vec::new(),
        }
    }

    async fn escalate(
        &self,
        document: &Document,
        score_result: &ScoreResult,
        decision: &str,
        correlation_id: CorrelationId,
    ) -> Result<Uuid> {
        let result_json = document.result_json.clone().unwrap_or(serde_json::Value::Null);
        let ocr_text = document.ocr_text.clone().unwrap_or_default();
        let review = self
            .escalate_with_payload(document, score_result, decision, correlation_id, result_json, ocr_text)
            .await?;
        Ok(review.id)
    }

    #[allow(clippy::too_many_arguments)]
    async fn escalate_with_payload(
        &self,
        document: &Document,
        score_result: &ScoreResult,
        decision: &str,
        correlation_id: CorrelationId,
        result_json: serde_json::Value,
        ocr_text: String,
    ) -> Result<ManualReview> {
        if let Some(existing) = self.manual_reviews.get_active_for_document(document.id).await? {
            return Ok(existing);
        }

        let payload = serde_json::json!({
            "parsedData": result_json,
            "ocrText": ocr_text,
            "score": score_result.score,
            "decision": decision,
            "reasons": score_result.reasons,
        });
        let mut review = self
            .manual_reviews
            .create(document.id, document.user_id, payload)
            .await
            .context("failed to create manual review")?;

        let envelope = ReviewEnvelope {
            review_id: review.id,
            document_id: document.id,
            user_id: document.user_id,
            document_type: document.doc_type.as_str().to_string(),
            parsed_data: document.result_json.clone().unwrap_or(serde_json::Value::Null),
            ocr_text: document.ocr_text.clone().unwrap_or_default(),
            score: score_result.score,
            decision: decision.to_string(),
            reasons: score_result.reasons.clone(),
            callback_url: format!("{}/{}/callback", self.reviewer_callback_url, review.id),
            correlation_id: correlation_id.into(),
        };

        // A Forwarder submission failure is logged but never reopens the
        // document: the retry queue is the Forwarder's own problem to
        // solve, not the Decision Router's.
        match self.forwarder.submit(envelope).await {
            Ok(Some(ticket_id)) => {
                if let Err(err) = self.manual_reviews.set_ticket_id(review.id, &ticket_id).await {
                    tracing::warn!(review_id = %review.id, error = %err, "failed to persist reviewer ticket id");
                } else {
                    review.buli2_task_id = Some(ticket_id);
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(document_id = %document.id, review_id = %review.id, error = %err, "review forwarding failed, relying on forwarder retry queue");
            }
        }

        Ok(review)
    }

    async fn recompute_and_persist_user_status(&self, user_id: Uuid) -> Result<()> {
        let docs = self.documents.list_by_user(user_id).await?;
        let status = recompute_user_status(&docs);
        self.users
            .set_verification_status(user_id, status)
            .await
            .context("failed to persist user verification status")?;
        Ok(())
    }
}

/// User `verification_status` join rule: evaluated over each
/// document type's most recent document (a user's "required documents").
/// Rejection of any required document wins outright; full approval joins
/// to the highest-confidence approved kind; otherwise the most-advanced
/// pending intermediate wins.
pub fn recompute_user_status(documents: &[Document]) -> VerificationStatus {
    let representatives = latest_per_type(documents);
    if representatives.is_empty() {
        return VerificationStatus::Pending;
    }

    if let Some(rejected) = representatives
        .iter()
        .find(|d| d.verification_status.is_rejected())
    {
        return rejected.verification_status;
    }

    if representatives.iter().all(|d| d.verification_status.is_approved()) {
        let all_auto_approved = representatives
            .iter()
            .all(|d| d.verification_status == VerificationStatus::AutoApproved);
        return if all_auto_approved {
            VerificationStatus::AutoApproved
        } else {
            VerificationStatus::ManuallyApproved
        };
    }

    let any_pending_review = representatives
        .iter()
        .any(|d| d.verification_status == VerificationStatus::PendingManualReview);
    if any_pending_review {
        VerificationStatus::PendingManualReview
    } else {
        VerificationStatus::Pending
    }
}

fn latest_per_type(documents: &[Document]) -> Vec<Document> {
    let mut ktp: Option<&Document> = None;
    let mut npwp: Option<&Document> = None;

    for doc in documents {
        let slot = match doc.doc_type {
            DocumentType::Ktp => &mut ktp,
            DocumentType::Npwp => &mut npwp,
        };
        match slot {
            Some(current) if current.created_at >= doc.created_at => {}
            _ => *slot = Some(doc),
        }
    }

    [ktp, npwp].into_iter().flatten().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(doc_type: DocumentType, status: VerificationStatus) -> Document {
        Document {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            doc_type,
            blob_key: "k".to_string(),
            status: crate::db::DocumentStatus::Completed,
            verification_status: status,
            ai_score: Some(80),
            ai_decision: Some("auto_approved".to_string()),
            result_json: None,
            ocr_text: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    #[test]
    fn no_documents_is_pending() {
        assert_eq!(recompute_user_status(&[]), VerificationStatus::Pending);
    }

    #[test]
    fn single_auto_approved_document_joins_to_auto_approved() {
        let docs = vec![doc(DocumentType::Ktp, VerificationStatus::AutoApproved)];
        assert_eq!(recompute_user_status(&docs), VerificationStatus::AutoApproved);
    }

    #[test]
    fn any_rejected_required_document_wins_outright() {
        let docs = vec![
            doc(DocumentType::Ktp, VerificationStatus::AutoApproved),
            doc(DocumentType::Npwp, VerificationStatus::ManuallyRejected),
        ];
        assert_eq!(recompute_user_status(&docs), VerificationStatus::ManuallyRejected);
    }

    #[test]
    fn all_approved_but_mixed_kind_joins_to_manually_approved() {
        let docs = vec![
            doc(DocumentType::Ktp, VerificationStatus::AutoApproved),
            doc(DocumentType::Npwp, VerificationStatus::ManuallyApproved),
        ];
        assert_eq!(recompute_user_status(&docs), VerificationStatus::ManuallyApproved);
    }

    #[test]
    fn all_auto_approved_joins_to_auto_approved() {
        let docs = vec![
            doc(DocumentType::Ktp, VerificationStatus::AutoApproved),
            doc(DocumentType::Npwp, VerificationStatus::AutoApproved),
        ];
        assert_eq!(recompute_user_status(&docs), VerificationStatus::AutoApproved);
    }

    #[test]
    fn pending_manual_review_dominates_plain_pending() {
        let docs = vec![
            doc(DocumentType::Ktp, VerificationStatus::Pending),
            doc(DocumentType::Npwp, VerificationStatus::PendingManualReview),
        ];
        assert_eq!(recompute_user_status(&docs), VerificationStatus::PendingManualReview);
    }

    #[test]
    fn only_pending_documents_joins_to_pending() {
        let docs = vec![doc(DocumentType::Ktp, VerificationStatus::Pending)];
        assert_eq!(recompute_user_status(&docs), VerificationStatus::Pending);
    }

    #[test]
    fn newest_document_per_type_is_the_representative() {
        let mut older = doc(DocumentType::Ktp, VerificationStatus::AutoRejected);
        older.created_at = Utc::now() - chrono::Duration::hours(2);
        let newer = doc(DocumentType::Ktp, VerificationStatus::AutoApproved);
        // newer supersedes the older rejection for the same document type
        assert_eq!(recompute_user_status(&[older, newer]), VerificationStatus::AutoApproved);
    }
}
