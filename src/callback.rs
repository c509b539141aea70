//! Callback Receiver — inbound signed reviewer decisions.
//! Signature verification, payload validation, and idempotent terminal-
//! state handling all live here; the HTTP handler only extracts headers
//! and the raw body and defers everything else to this module.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::db::{DocumentRepo, ManualReviewRepo, ReviewStatus, UserRepo, VerificationStatus};
use crate::decision::recompute_user_status;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackPayload {
    pub decision: String,
    pub notes: Option<String>,
    #[serde(rename = "taskId")]
    pub task_id: Option<String>,
}

/// `X-Buli2-Signature: sha256=<hex>`, HMAC-SHA256 over the raw body.
/// Tries the primary secret first, then the deprecated fallback if
/// configured — a rotation window so an in-flight secret change doesn't
/// reject callbacks signed with the old key.
pub fn verify_signature(
    raw_body: &[u8],
    header_value: Option<&str>,
    primary_secret: &str,
    legacy_secret: Option<&str>,
) -> Result<(), AppError> {
    let header_value = header_value.ok_or(AppError::MissingSignature)?;
    let provided_hex = header_value
        .strip_prefix("sha256=")
        .ok_or(AppError::InvalidSignature)?;
    let provided = hex::decode(provided_hex).map_err(|_| AppError::InvalidSignature)?;

    if hmac_matches(raw_body, primary_secret, &provided) {
        return Ok(());
    }

    if let Some(legacy) = legacy_secret {
        if hmac_matches(raw_body, legacy, &provided) {
            tracing::warn!("callback authenticated against legacy HMAC secret, rotate REVIEWER_HMAC_SECRET");
            return Ok(());
        }
    }

    Err(AppError::InvalidSignature)
}

fn hmac_matches(raw_body: &[u8], secret: &str, provided: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    let expected = mac.finalize().into_bytes();
    expected.ct_eq(provided).into()
}

#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub applied: bool,
    pub verification_status: VerificationStatus,
}

#[derive(Clone)]
pub struct CallbackReceiver {
    manual_reviews: ManualReviewRepo,
    documents: DocumentRepo,
    users: UserRepo,
    primary_secret: String,
    legacy_secret: Option<String>,
}

impl CallbackReceiver {
    pub fn new(
        manual_reviews: ManualReviewRepo,
        documents: DocumentRepo,
        users: UserRepo,
        primary_secret: String,
        legacy_secret: Option<String>,
    ) -> Self {
        Self {
            manual_reviews,
            documents,
            users,
            primary_secret,
            legacy_secret,
        }
    }

    /// `POST /internal/reviews/{reviewId}/callback`. The caller has
    /// already verified the signature against `raw_body` via
    /// `verify_signature` before this is invoked, against the exact same
    /// bytes the payload was parsed from.
    pub async fn handle(&self, review_id: Uuid, payload: CallbackPayload) -> Result<CallbackOutcome, AppError> {
        let (status, doc_status) = match payload.decision.as_str() {
            "approved" => (ReviewStatus::Approved, VerificationStatus::ManuallyApproved),
            "rejected" => (ReviewStatus::Rejected, VerificationStatus::ManuallyRejected),
            other => {
                return Err(AppError::Validation(format!(
                    "decision must be \"approved\" or \"rejected\", got \"{other}\""
                )))
            }
        };

        let review = self
            .manual_reviews
            .get(review_id)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| AppError::NotFound(format!("manual review {review_id} not found")))?;

        if review.status.is_terminal() {
            // Idempotent replay: no-op, return the
            // outcome already on record rather than re-applying.
            return Ok(CallbackOutcome {
                applied: false,
                verification_status: doc_status,
            });
        }

        let applied = self
            .manual_reviews
            .set_terminal(review.id, status, &payload.decision, payload.notes.as_deref(), payload.task_id.as_deref())
            .await
            .map_err(AppError::Internal)?;

        if !applied {
            // Lost a race with a concurrent callback replay between the
            // terminal check above and the conditional update.
            return Ok(CallbackOutcome {
                applied: false,
                verification_status: doc_status,
            });
        }

        self.documents
            .set_verification_status(review.document_id, doc_status)
            .await
            .map_err(AppError::Internal)?;

        let docs = self
            .documents
            .list_by_user(review.user_id)
            .await
            .map_err(AppError::Internal)?;
        let user_status = recompute_user_status(&docs);
        self.users
            .set_verification_status(review.user_id, user_status)
            .await
            .map_err(AppError::Internal)?;

        Ok(CallbackOutcome {
            applied: true,
            verification_status: doc_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn missing_header_is_rejected() {
        let err = verify_signature(b"body", None, "secret", None).unwrap_err();
        assert!(matches!(err, AppError::MissingSignature));
    }

    #[test]
    fn valid_primary_signature_is_accepted() {
        let body = b"{\"decision\":\"approved\"}";
        let sig = sign(body, "secret");
        assert!(verify_signature(body, Some(&sig), "secret", None).is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let body = b"{\"decision\":\"approved\"}";
        let sig = sign(body, "secret");
        let tampered = b"{\"decision\":\"rejected\"}";
        let err = verify_signature(tampered, Some(&sig), "secret", None).unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));
    }

    #[test]
    fn legacy_secret_accepted_as_fallback() {
        let body = b"legacy body";
        let sig = sign(body, "old-secret");
        assert!(verify_signature(body, Some(&sig), "new-secret", Some("old-secret")).is_ok());
    }

    #[test]
    fn neither_secret_matching_is_rejected() {
        let body = b"body";
        let sig = sign(body, "unrelated-secret");
        let err = verify_signature(body, Some(&sig), "new-secret", Some("old-secret")).unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));
    }

    #[test]
    fn malformed_header_prefix_is_rejected() {
        let err = verify_signature(b"body", Some("not-sha256-prefixed"), "secret", None).unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));
    }
}
