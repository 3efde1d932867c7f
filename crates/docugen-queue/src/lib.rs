//! The Task Broker (C2) for the documentation job orchestration engine.
//!
//! Delivers `WorkItem`s from the Submitter to the Worker Runtime with
//! at-least-once semantics and a visibility timeout, per spec.md §4.2.

pub mod broker;
pub mod error;

pub use broker::{NackOutcome, ReapOutcome, ReservationHandle, RedisBroker, TaskBroker};
pub use error::{QueueError, QueueResult};

use redis::aio::ConnectionManager;

/// Create a Redis connection manager for the broker.
pub async fn connect(redis_url: &str) -> QueueResult<ConnectionManager> {
    let client = redis::Client::open(redis_url)?;
    Ok(ConnectionManager::new(client).await?)
}
