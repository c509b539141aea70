//! `POST /documents/{id}/process` — enqueue an uploaded document for the
//! worker pool to pick up.

use axum::extract::Path;
use axum::{Extension, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::DocumentStatus;
use crate::error::AppError;
use crate::state::AppState;

pub async fn process(
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

    if document.status != DocumentStatus::Uploaded {
        return Err(AppError::Conflict(format!(
            "document {document_id} is already {:?}",
            document.status
        )));
    }

    let enqueued = state
        .queue
        .enqueue(document_id)
        .await
        .map_err(AppError::Internal)?;
    if !enqueued {
        return Err(AppError::Conflict(format!(
            "document {document_id} is already queued or processing"
        )));
    }

    Ok(Json(json!({ "queued": true, "documentId": document_id })))
}
