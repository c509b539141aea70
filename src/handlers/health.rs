//! `GET /health` — liveness plus a shallow check that the State Store and
//! Queue Substrate are reachable, in the pack's
//! `sem_os_server::handlers::health` style.

use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(Extension(state): Extension<AppState>) -> Json<Value> {
    let db_connected = match state.documents.count_by_status().await {
        Ok(_) => true,
        Err(err) => {
            tracing::error!(error = %err, "health check failed to reach state store");
            false
        }
    };

    // This build substitutes Postgres for the queue substrate the
    // contract originally named after Redis; `queueConnected` is that
    // check under its new name.
    let queue_connected = match state.queue.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(error = %err, "health check failed to reach queue substrate");
            false
        }
    };

    Json(json!({
        "ok": db_connected && queue_connected,
        "dbConnected": db_connected,
        "queueConnected": queue_connected,
    }))
}
