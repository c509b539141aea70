//! `GET /documents/{id}/download` — a time-bounded presigned URL onto the
//! original blob. Clients never see the raw blob key.

use axum::extract::Path;
use axum::{Extension, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;

pub async fn download(
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

    let url = state
        .blobs
        .presign(&document.blob_key, state.config.blob_presign_ttl)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({
        "url": url,
        "expiresIn": state.config.blob_presign_ttl.as_secs(),
    })))
}
