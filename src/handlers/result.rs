//! `GET /documents/{id}/result` — processing status and, once `completed`,
//! the score/decision outcome.

use axum::extract::Path;
use axum::{Extension, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;

pub async fn result(
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
        "docType": document.doc_type,
        "status": document.status,
        "verificationStatus": document.verification_status,
        "score": document.ai_score,
        "decision": document.ai_decision,
        "parsedData": document.result_json,
        "processedAt": document.processed_at,
    })))
}
