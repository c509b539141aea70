//! `POST /documents/upload` — multipart upload of a KTP or NPWP image/PDF.

use axum::extract::Multipart;
use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::auth::AuthenticatedUser;
use crate::blob;
use crate::db::DocumentType;
use crate::error::AppError;
use crate::state::AppState;

pub async fn upload(
    user: AuthenticatedUser,
    Extension(state): Extension<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let mut doc_type: Option<DocumentType> = None;
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("type") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("invalid type field: {e}")))?;
                doc_type = Some(
                    DocumentType::parse(&raw)
                        .ok_or_else(|| AppError::Validation(format!("type must be KTP or NPWP, got \"{raw}\"")))?,
                );
            }
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("invalid file field: {e}")))?;
                if bytes.len() as u64 > state.config.max_upload_bytes {
                    return Err(AppError::Validation(format!(
                        "file exceeds {} byte limit",
                        state.config.max_upload_bytes
                    )));
                }
                file_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let doc_type = doc_type.ok_or_else(|| AppError::Validation("missing required field \"type\"".to_string()))?;
    let bytes = file_bytes.ok_or_else(|| AppError::Validation("missing required field \"file\"".to_string()))?;

    let content_type = blob::sniff_content_type(&bytes)
        .ok_or_else(|| AppError::Validation("file is not a recognized JPEG, PNG, or PDF".to_string()))?;
    let ext = blob::extension_for_content_type(content_type);

    let user_row = state
        .users
        .get_or_create(&user.sub, &user.email)
        .await
        .map_err(AppError::Internal)?;

    let key = blob::scoped_key(user_row.id, doc_type, ext);
    state
        .blobs
        .put(&key, bytes, content_type)
        .await
        .map_err(AppError::Internal)?;

    let document = state
        .documents
        .insert(user_row.id, doc_type, &key)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({
        "success": true,
        "documentId": document.id,
        "document": {
            "id": document.id,
            "userId": document.user_id,
            "docType": document.doc_type,
            "status": document.status,
            "verificationStatus": document.verification_status,
            "createdAt": document.created_at,
        },
    })))
}
