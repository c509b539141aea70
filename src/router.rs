//! Router construction, grounded on
//! `sem_os_server::router::build_router`. This crate has no JWT
//! middleware to gate a `protected` group with — each handler extracts
//! `AuthenticatedUser` itself — so the split here is user-facing vs.
//! internal/reviewer-facing vs. unauthenticated ops endpoints instead.

use axum::{
    routing::{get, post},
    Extension, Router,
};

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let documents = Router::new()
        .route("/documents/upload", post(handlers::upload::upload))
        .route("/documents/:id/process", post(handlers::process::process))
        .route("/documents/:id/result", get(handlers::result::result))
        .route("/documents/:id/download", get(handlers::download::download));

    let verification = Router::new()
        .route("/verification/evaluate", post(handlers::verify::evaluate))
        .route("/verification/status/:docId", get(handlers::verify::status))
        .route("/verification/:docId/escalate", post(handlers::verify::escalate));

    let internal = Router::new()
        .route(
            "/internal/reviews/:reviewId/callback",
            post(handlers::internal::reviewer_callback),
        )
        .route(
            "/internal/verification/result",
            post(handlers::internal::inbound_result),
        );

    let ops = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::metrics::metrics));

    documents
        .merge(verification)
        .merge(internal)
        .merge(ops)
        .layer(Extension(state))
}
