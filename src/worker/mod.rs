//! Worker Pool — dequeue-lock-process loop, plus the
//! reaper and retry-sweep background tasks that keep the queue healthy
//! around it.

pub mod ocr;
pub mod pool;
pub mod reaper;
pub mod retry_sweep;

pub use ocr::OcrEngine;
pub use pool::{JobWorker, WorkerConfig};
pub use reaper::Reaper;
