//! HTTP handlers. Each module corresponds to one contract-table
//! row or a small cluster of closely related ones.

pub mod download;
pub mod health;
pub mod internal;
pub mod metrics;
pub mod process;
pub mod result;
pub mod upload;
pub mod verify;
