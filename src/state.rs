//! Shared application state, threaded into handlers via `Extension`
//! (the pack's convention in `sem_os_server::router`) rather than axum's
//! typed `State` — this crate's handlers already take several distinct
//! shared services, and `Extension` lets each be injected independently.

use std::sync::Arc;

use crate::blob::BlobStore;
use crate::callback::CallbackReceiver;
use crate::config::Config;
use crate::db::{DocumentRepo, ManualReviewRepo, UserRepo};
use crate::decision::DecisionRouter;
use crate::forwarder::{CircuitBreaker, RetryQueue};
use crate::queue::QueueSubstrate;

#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentRepo,
    pub users: UserRepo,
    pub manual_reviews: ManualReviewRepo,
    pub blobs: Arc<dyn BlobStore>,
    pub queue: QueueSubstrate,
    pub decision_router: DecisionRouter,
    pub callback_receiver: CallbackReceiver,
    pub forwarder_breaker: Arc<CircuitBreaker>,
    pub forwarder_retry_queue: RetryQueue,
    pub config: Arc<Config>,
}
