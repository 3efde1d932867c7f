//! The Worker Runtime (C4) for the documentation job orchestration
//! engine: claims reserved work items, drives them through the
//! Pipeline, and enforces soft/hard deadlines and crash recovery.

pub mod pool;
pub mod reaper;
pub mod worker;

pub use pool::WorkerPool;
pub use reaper::Reaper;
pub use worker::Worker;
