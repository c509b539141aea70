//! Queue Substrate — durable FIFO queue, processing set,
//! per-document lock, attempts counter, delayed/retry queue, and a
//! pub/sub results channel.
//!
//! Durable, external storage is the only hard requirement; this build
//! keeps the substrate on the same Postgres instance as the State Store
//! (grounded on `ocr_queue.rs`'s `FOR UPDATE SKIP LOCKED` claim pattern)
//! rather than introducing a second stateful dependency — see
//! `DESIGN.md` for the tradeoff. Locks use a row with an `expires_at`
//! column instead of a native key TTL; `QueueSubstrate::acquire_lock`
//! enforces expiry at read time.
//!
//! Assumed schema (documented here for implementers wiring up
//! migrations):
//!
//! ```sql
//! CREATE TABLE queue_items (
//!     document_id      uuid PRIMARY KEY,
//!     queue_family     text NOT NULL,       -- 'cpu' | 'gpu'
//!     state            text NOT NULL,       -- 'queued' | 'processing' | 'delayed'
//!     attempts         integer NOT NULL DEFAULT 0,
//!     correlation_id   uuid,
//!     enqueued_at      timestamptz NOT NULL DEFAULT now(),
//!     processing_started_at timestamptz,
//!     retry_at         timestamptz
//! );
//! CREATE TABLE document_locks (
//!     document_id  uuid PRIMARY KEY,
//!     holder       uuid NOT NULL,
//!     expires_at   timestamptz NOT NULL
//! );
//! ```

pub mod correlation;
pub mod substrate;

pub use correlation::CorrelationId;
pub use substrate::{ProcessingResult, QueueFamily, QueueItem, QueueSubstrate};
