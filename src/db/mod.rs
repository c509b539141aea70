//! State Store — the durable source of truth for outcomes.
//!
//! Repositories are plain structs over a `PgPool`, following the pack's
//! `CorrelationStore` shape (`bpmn_integration/correlation.rs`): one struct
//! per table, methods that map 1:1 onto the operations the rest of the
//! crate needs. Runtime-checked `sqlx::query`/`query_as` calls are used
//! throughout (not the `query!` compile-time macro) so the crate builds
//! without a live database connection at compile time, matching the style
//! in `ocr_queue.rs`.

pub mod documents;
pub mod manual_reviews;
pub mod models;
pub mod users;

pub use documents::DocumentRepo;
pub use manual_reviews::ManualReviewRepo;
pub use models::*;
pub use users::UserRepo;
