//! The Task Broker (C2): a Redis-backed, at-least-once work queue.
//!
//! Grounded on the teacher's own queue abstraction shape
//! (`buildit_scheduler::queue::JobQueue` — a thin struct wrapping a pool,
//! exposing `enqueue`/`claim`/`complete`/`fail`/`release`) and on
//! `rcommerce-core::jobs::queue::JobQueue`, the pack's Redis-backed
//! reference (raw `redis::Cmd` construction rather than a query builder,
//! one namespaced key per concern). spec.md §6 calls for "Redis-compatible
//! list semantics"; here `RPUSH`/`BLMOVE`/`LREM` plus a per-item
//! reservation key implement exactly that.

use std::time::Duration;

use async_trait::async_trait;
use docugen_core::WorkItem;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Cmd, FromRedisValue};

use crate::error::QueueResult;

/// A reserved `WorkItem` along with what's needed to `ack`/`nack` it.
#[derive(Debug, Clone)]
pub struct ReservationHandle {
    pub job_id: String,
    raw_payload: String,
    /// How many times this job's item has been delivered, including this
    /// delivery. Tracked by the broker so the poison-pill threshold (N_max)
    /// can be enforced without the caller keeping its own count.
    pub delivery_count: u32,
}

/// What happened to a `nack`'d item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackOutcome {
    /// Re-delivered; still below the poison-pill threshold.
    Requeued,
    /// Moved to the dead-letter list; the caller should fail the Job.
    Abandoned { delivery_count: u32 },
}

/// What `reap_expired` did with one processing-list item whose reservation
/// key had expired without an `ack`/`nack` — the crash-recovery path of
/// spec.md §4.4 step 8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReapOutcome {
    /// Returned to `pending`; still below the poison-pill threshold.
    Requeued { job_id: String },
    /// Moved to the dead-letter list; the caller should fail the Job with
    /// `worker-crash`.
    Abandoned { job_id: String },
}

/// Abstracts the durable work queue carrying `WorkItem`s from the
/// Submitter to the Worker Runtime (spec.md §4.2).
#[async_trait]
pub trait TaskBroker: Send + Sync {
    async fn enqueue(&self, item: &WorkItem) -> QueueResult<()>;

    /// Block up to `poll_timeout` waiting for an item; once reserved, the
    /// item is invisible to other reservers for `visibility_timeout`.
    async fn reserve(
        &self,
        poll_timeout: Duration,
        visibility_timeout: Duration,
    ) -> QueueResult<Option<(WorkItem, ReservationHandle)>>;

    async fn ack(&self, handle: ReservationHandle) -> QueueResult<()>;

    /// `retryable=false` sends the item straight to the dead-letter list.
    /// `retryable=true` requeues unless `handle.delivery_count` has already
    /// reached `poison_pill_threshold` (N_max), in which case the item is
    /// abandoned just the same, per spec.md §4.2's permanent-removal rule.
    async fn nack(
        &self,
        handle: ReservationHandle,
        retryable: bool,
        poison_pill_threshold: u32,
    ) -> QueueResult<NackOutcome>;

    /// Scan the processing list for reservations that expired without an
    /// `ack`/`nack` (the owning worker died) and either redeliver or
    /// abandon them per the poison-pill threshold.
    async fn reap_expired(&self, poison_pill_threshold: u32) -> QueueResult<Vec<ReapOutcome>>;
}

/// Redis-backed `TaskBroker`. Key layout under `{prefix}`:
/// - `:pending` — list of JSON `WorkItem`s awaiting reservation.
/// - `:processing` — list of JSON `WorkItem`s currently reserved.
/// - `:deadletter` — list of abandoned JSON `WorkItem`s (inspectable by
///   operators, never consumed by workers).
/// - `:reservation:{job_id}` — presence + TTL marks an active reservation.
/// - `:delivery_count` — hash of job_id -> delivery count.
pub struct RedisBroker {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisBroker {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn pending_key(&self) -> String {
        format!("{}:pending", self.prefix)
    }

    fn processing_key(&self) -> String {
        format!("{}:processing", self.prefix)
    }

    fn deadletter_key(&self) -> String {
        format!("{}:deadletter", self.prefix)
    }

    fn reservation_key(&self, job_id: &str) -> String {
        format!("{}:reservation:{}", self.prefix, job_id)
    }

    fn delivery_count_key(&self) -> String {
        format!("{}:delivery_count", self.prefix)
    }

    async fn exec<T: FromRedisValue>(&self, cmd: &mut Cmd) -> QueueResult<T> {
        let mut conn = self.conn.clone();
        Ok(cmd.query_async(&mut conn).await?)
    }
}

#[async_trait]
impl TaskBroker for RedisBroker {
    async fn enqueue(&self, item: &WorkItem) -> QueueResult<()> {
        let payload = serde_json::to_string(item)?;
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(self.pending_key(), payload).await?;
        Ok(())
    }

    async fn reserve(
        &self,
        poll_timeout: Duration,
        visibility_timeout: Duration,
    ) -> QueueResult<Option<(WorkItem, ReservationHandle)>> {
        let mut cmd = Cmd::new();
        cmd.arg("BLMOVE")
            .arg(self.pending_key())
            .arg(self.processing_key())
            .arg("RIGHT")
            .arg("LEFT")
            .arg(poll_timeout.as_secs_f64());
        let raw: Option<String> = self.exec(&mut cmd).await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let item: WorkItem = serde_json::from_str(&raw)?;
        let job_id = item.job_id.to_string();

        let mut incr = Cmd::new();
        incr.arg("HINCRBY")
            .arg(self.delivery_count_key())
            .arg(&job_id)
            .arg(1);
        let delivery_count: i64 = self.exec(&mut incr).await?;

        let mut set = Cmd::new();
        set.arg("SET")
            .arg(self.reservation_key(&job_id))
            .arg(delivery_count)
            .arg("PX")
            .arg(visibility_timeout.as_millis() as u64);
        let _: () = self.exec(&mut set).await?;

        Ok(Some((
            item,
            ReservationHandle {
                job_id,
                raw_payload: raw,
                delivery_count: delivery_count as u32,
            },
        )))
    }

    async fn ack(&self, handle: ReservationHandle) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.reservation_key(&handle.job_id))
            .await?;
        conn.hdel::<_, _, ()>(self.delivery_count_key(), &handle.job_id)
            .await?;

        let mut lrem = Cmd::new();
        lrem.arg("LREM")
            .arg(self.processing_key())
            .arg(1)
            .arg(&handle.raw_payload);
        let _: () = self.exec(&mut lrem).await?;
        Ok(())
    }

    async fn nack(
        &self,
        handle: ReservationHandle,
        retryable: bool,
        poison_pill_threshold: u32,
    ) -> QueueResult<NackOutcome> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.reservation_key(&handle.job_id))
            .await?;

        let mut lrem = Cmd::new();
        lrem.arg("LREM")
            .arg(self.processing_key())
            .arg(1)
            .arg(&handle.raw_payload);
        let _: () = self.exec(&mut lrem).await?;

        if retryable && handle.delivery_count < poison_pill_threshold {
            conn.rpush::<_, _, ()>(self.pending_key(), &handle.raw_payload)
                .await?;
            Ok(NackOutcome::Requeued)
        } else {
            conn.hdel::<_, _, ()>(self.delivery_count_key(), &handle.job_id)
                .await?;
            conn.rpush::<_, _, ()>(self.deadletter_key(), &handle.raw_payload)
                .await?;
            Ok(NackOutcome::Abandoned {
                delivery_count: handle.delivery_count,
            })
        }
    }

    async fn reap_expired(&self, poison_pill_threshold: u32) -> QueueResult<Vec<ReapOutcome>> {
        let mut conn = self.conn.clone();
        let items: Vec<String> = conn.lrange(self.processing_key(), 0, -1).await?;

        let mut outcomes = Vec::new();
        for raw in items {
            let Ok(item) = serde_json::from_str::<WorkItem>(&raw) else {
                continue;
            };
            let job_id = item.job_id.to_string();

            let still_reserved: bool = conn.exists(self.reservation_key(&job_id)).await?;
            if still_reserved {
                continue;
            }

            let count: Option<i64> = conn.hget(self.delivery_count_key(), &job_id).await?;
            let count = count.unwrap_or(1);

            let mut lrem = Cmd::new();
            lrem.arg("LREM").arg(self.processing_key()).arg(1).arg(&raw);
            let _: () = self.exec(&mut lrem).await?;

            if count as u32 >= poison_pill_threshold {
                conn.hdel::<_, _, ()>(self.delivery_count_key(), &job_id)
                    .await?;
                conn.rpush::<_, _, ()>(self.deadletter_key(), &raw).await?;
                outcomes.push(ReapOutcome::Abandoned { job_id });
            } else {
                conn.lpush::<_, _, ()>(self.pending_key(), &raw).await?;
                outcomes.push(ReapOutcome::Requeued { job_id });
            }
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docugen_core::{JobVariant, ResourceId};

    async fn test_broker() -> Option<RedisBroker> {
        let url = std::env::var("DOCUGEN_TEST_REDIS_URL").ok()?;
        let client = redis::Client::open(url).ok()?;
        let conn = ConnectionManager::new(client).await.ok()?;
        Some(RedisBroker::new(conn, "docugen:test:jobs"))
    }

    #[tokio::test]
    async fn enqueue_then_reserve_roundtrips_the_item() {
        let Some(broker) = test_broker().await else {
            return;
        };
        let item = WorkItem {
            job_id: ResourceId::new(),
            credential: None,
            variant: JobVariant::Docs,
        };
        broker.enqueue(&item).await.unwrap();

        let (reserved, handle) = broker
            .reserve(Duration::from_secs(2), Duration::from_secs(30))
            .await
            .unwrap()
            .expect("item should be reserved");
        assert_eq!(reserved.job_id, item.job_id);
        assert_eq!(handle.delivery_count, 1);

        broker.ack(handle).await.unwrap();
    }

    #[tokio::test]
    async fn nack_retryable_requeues_below_threshold() {
        let Some(broker) = test_broker().await else {
            return;
        };
        let item = WorkItem {
            job_id: ResourceId::new(),
            credential: None,
            variant: JobVariant::Docs,
        };
        broker.enqueue(&item).await.unwrap();

        let (_, handle) = broker
            .reserve(Duration::from_secs(2), Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        let outcome = broker.nack(handle, true, 3).await.unwrap();
        assert_eq!(outcome, NackOutcome::Requeued);

        let (reserved_again, handle) = broker
            .reserve(Duration::from_secs(2), Duration::from_secs(30))
            .await
            .unwrap()
            .expect("requeued item should be reservable again");
        assert_eq!(reserved_again.job_id, item.job_id);
        assert_eq!(handle.delivery_count, 2);
        broker.ack(handle).await.unwrap();
    }

    #[tokio::test]
    async fn nack_retryable_abandons_once_threshold_is_reached() {
        let Some(broker) = test_broker().await else {
            return;
        };
        let item = WorkItem {
            job_id: ResourceId::new(),
            credential: None,
            variant: JobVariant::Docs,
        };
        broker.enqueue(&item).await.unwrap();

        let (_, handle) = broker
            .reserve(Duration::from_secs(2), Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.delivery_count, 1);
        let outcome = broker.nack(handle, true, 1).await.unwrap();
        assert!(matches!(outcome, NackOutcome::Abandoned { .. }));

        let nothing = broker
            .reserve(Duration::from_millis(200), Duration::from_secs(30))
            .await
            .unwrap();
        assert!(nothing.is_none());
    }

    #[tokio::test]
    async fn nack_non_retryable_abandons_to_deadletter() {
        let Some(broker) = test_broker().await else {
            return;
        };
        let item = WorkItem {
            job_id: ResourceId::new(),
            credential: None,
            variant: JobVariant::Docs,
        };
        broker.enqueue(&item).await.unwrap();

        let (_, handle) = broker
            .reserve(Duration::from_secs(2), Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        let outcome = broker.nack(handle, false, 3).await.unwrap();
        assert!(matches!(outcome, NackOutcome::Abandoned { .. }));

        let nothing = broker
            .reserve(Duration::from_millis(200), Duration::from_secs(30))
            .await
            .unwrap();
        assert!(nothing.is_none());
    }
}
