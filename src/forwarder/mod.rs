//! Review Forwarder — outbound delivery to the external
//! reviewer, guarded by a circuit breaker, with a persistent retry
//! queue and periodic drainer for calls that don't get through.

pub mod circuit;
pub mod client;
pub mod drainer;
pub mod retry_queue;

pub use circuit::CircuitBreaker;
pub use client::HttpReviewForwarder;
pub use drainer::RetryDrainer;
pub use retry_queue::RetryQueue;
