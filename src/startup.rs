//! Startup recovery: run once before the HTTP listener binds
//! and the worker pool starts accepting new jobs. A crash mid-processing
//! leaves behind queue entries with nothing backing them, and documents
//! stuck `processing` with no matching queue entry at all — this brings
//! both back into a consistent state.

use crate::db::DocumentRepo;
use crate::queue::QueueSubstrate;

pub async fn recover(documents: &DocumentRepo, queue: &QueueSubstrate) -> anyhow::Result<()> {
    let known_ids = documents.list_active_ids().await?;
    let cleared = queue.clear_orphaned(&known_ids).await?;
    if cleared > 0 {
        tracing::warn!(cleared, "startup recovery: cleared orphaned queue entries");
    }

    let stuck = documents.list_stuck_processing().await?;
    for document in &stuck {
        let reset = documents.reset_to_uploaded(document.id).await?;
        if !reset {
            continue;
        }
        queue.enqueue(document.id).await?;
        tracing::warn!(document_id = %document.id, "startup recovery: requeued document stuck processing across restart");
    }

    if !stuck.is_empty() {
        tracing::info!(count = stuck.len(), "startup recovery: requeue pass complete");
    }

    Ok(())
}
