//! `POST /verification/evaluate`, `GET /verification/status/{docId}`,
//! `POST /verification/{docId}/escalate` — the explicit-evaluation
//! pathway and manual-review escalation surface.

use axum::extract::Path;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::DocumentStatus;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(rename = "documentId")]
    pub document_id: Uuid,
    #[serde(rename = "thresholdAutoApprove")]
    pub threshold_auto_approve: Option<i32>,
    #[serde(rename = "thresholdAutoReject")]
    pub threshold_auto_reject: Option<i32>,
}

pub async fn evaluate(
    user: AuthenticatedUser,
    Extension(state): Extension<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<Value>, AppError> {
    let user_row = state
        .users
        .find_by_sub(&user.sub)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    let document = state
        .documents
        .get_owned(req.document_id, user_row.id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("document {} not found", req.document_id)))?;

    if document.status != DocumentStatus::Completed {
        return Err(AppError::Conflict(format!(
            "document {} has not finished OCR processing",
            req.document_id
        )));
    }

    let threshold_auto_approve = req
        .threshold_auto_approve
        .unwrap_or(state.config.score_threshold_auto_approve);
    let threshold_auto_reject = req
        .threshold_auto_reject
        .unwrap_or(state.config.score_threshold_auto_reject);

    let record = state
        .decision_router
        .evaluate(&document, threshold_auto_approve, threshold_auto_reject)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(serde_json::to_value(record).unwrap_or_default()))
}

pub async fn status(
    user: AuthenticatedUser,
    Extension(state): Extension<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let user_row = state
        .users
        .find_by_sub(&user.sub)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    let document = state
        .documents
        .get_owned(document_id, user_row.id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("document {document_id} not found")))?;

    Ok(Json(json!({
        "documentId": document.id,
        "verificationStatus": document.verification_status,
    })))
}

pub async fn escalate(
    user: AuthenticatedUser,
    Extension(state): Extension<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let user_row = state
        .users
        .find_by_sub(&user.sub)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    let document = state
        .documents
        .get_owned(document_id, user_row.id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("document {document_id} not found")))?;

    if document.status != DocumentStatus::Completed {
        return Err(AppError::Conflict(format!(
            "document {document_id} has not finished OCR processing"
        )));
    }

    let review = state
        .decision_router
        .force_escalate(&document)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({
        "ticketId": review.buli2_task_id,
        "verificationStatus": crate::db::VerificationStatus::PendingManualReview,
    })))
}
