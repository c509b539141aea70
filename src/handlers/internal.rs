//! Reviewer-facing internal endpoints: the signed callback on a specific
//! review, and an alternate inbound-result endpoint for integrations that
//! address by review id in the body rather than in the path.
//! Both require `X-Service-Key` plus the HMAC signature over the raw
//! body — the service key scopes the caller to "is buli2", the HMAC
//! scopes the specific payload.

use axum::body::Bytes;
use axum::extract::Path;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth;
use crate::callback::{self, CallbackPayload};
use crate::error::AppError;
use crate::state::AppState;

fn signature_header(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-buli2-signature")?.to_str().ok()
}

fn service_key_header(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-service-key")?.to_str().ok()
}

pub async fn reviewer_callback(
    Extension(state): Extension<AppState>,
    Path(review_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    auth::verify_service_key(service_key_header(&headers), &state.config.reviewer_api_key)?;
    callback::verify_signature(
        &body,
        signature_header(&headers),
        &state.config.reviewer_hmac_secret,
        state.config.reviewer_hmac_secret_legacy.as_deref(),
    )?;

    let payload: CallbackPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed callback payload: {e}")))?;

    let outcome = state.callback_receiver.handle(review_id, payload).await?;

    Ok(Json(json!({ "success": true, "applied": outcome.applied })))
}

#[derive(Debug, Deserialize)]
pub struct InboundResultPayload {
    #[serde(rename = "reviewId")]
    pub review_id: Uuid,
    #[serde(flatten)]
    pub callback: CallbackPayload,
}

/// Same semantics as `reviewer_callback`, addressed by `reviewId` in the
/// body instead of the path, for reviewer integrations that post every
/// outcome to one fixed URL.
pub async fn inbound_result(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    auth::verify_service_key(service_key_header(&headers), &state.config.reviewer_api_key)?;
    callback::verify_signature(
        &body,
        signature_header(&headers),
        &state.config.reviewer_hmac_secret,
        state.config.reviewer_hmac_secret_legacy.as_deref(),
    )?;

    let payload: InboundResultPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed result payload: {e}")))?;

    let outcome = state
        .callback_receiver
        .handle(payload.review_id, payload.callback)
        .await?;

    Ok(Json(json!({ "success": true, "applied": outcome.applied })))
}
