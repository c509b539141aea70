//! `GET /metrics` — an EMF-style JSON snapshot (document counts by
//! status, forwarder retry queue depth, circuit breaker state) for
//! scraping into CloudWatch or a similar log-based metrics pipeline.

use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

pub async fn metrics(Extension(state): Extension<AppState>) -> Result<Json<Value>, AppError> {
    let by_status = state
        .documents
        .count_by_status()
        .await
        .map_err(AppError::Internal)?;
    let documents_by_status: serde_json::Map<String, Value> = by_status
        .into_iter()
        .map(|(status, count)| (format!("{status:?}").to_lowercase(), json!(count)))
        .collect();

    let retry_queue_depth = state
        .forwarder_retry_queue
        .depth()
        .await
        .map_err(AppError::Internal)?;
    let breaker_state = state.forwarder_breaker.state().await;

    Ok(Json(json!({
        "documentsByStatus": documents_by_status,
        "forwarderRetryQueueDepth": retry_queue_depth,
        "forwarderCircuitBreakerState": breaker_state.as_str(),
    })))
}
