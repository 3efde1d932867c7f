//! Crash recovery (spec.md §4.4 step 8) and the stale-`pending` sweep
//! (spec.md §4.3 step 4 / the Submitter's enqueue-timeout).
//!
//! A low-frequency background task, separate from the claim/execute
//! loops, calls `broker.reap_expired` and reacts only to jobs the broker
//! gave up on (`ReapOutcome::Abandoned`) — redeliveries are already back
//! on the `pending` list for a worker slot to pick up, so no further
//! status mutation is needed for those.

use std::sync::Arc;
use std::time::Duration;

use docugen_core::{JobStatus, ResourceId, StageErrorKind};
use docugen_db::JobRepo;
use docugen_queue::{ReapOutcome, TaskBroker};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const REAP_INTERVAL: Duration = Duration::from_secs(30);

pub struct Reaper {
    broker: Arc<dyn TaskBroker>,
    job_repo: Arc<dyn JobRepo>,
    poison_pill_threshold: u32,
    grace_period: chrono::Duration,
}

impl Reaper {
    pub fn new(
        broker: Arc<dyn TaskBroker>,
        job_repo: Arc<dyn JobRepo>,
        poison_pill_threshold: u32,
        grace_period: Duration,
    ) -> Self {
        Self {
            broker,
            job_repo,
            poison_pill_threshold,
            grace_period: chrono::Duration::from_std(grace_period)
                .unwrap_or_else(|_| chrono::Duration::seconds(900)),
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(REAP_INTERVAL) => {}
            }
            self.sweep_crashed().await;
            self.sweep_stale_pending().await;
        }
    }

    async fn sweep_crashed(&self) {
        let outcomes = match self.broker.reap_expired(self.poison_pill_threshold).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(error = %e, "reap_expired failed");
                return;
            }
        };

        for outcome in outcomes {
            let ReapOutcome::Abandoned { job_id } = outcome else {
                continue;
            };
            let Ok(id) = job_id.parse::<ResourceId>() else {
                continue;
            };
            info!(job_id = %id, "job abandoned after exceeding the poison-pill threshold");
            let _ = self
                .job_repo
                .set_status(id, JobStatus::Failed, Some(StageErrorKind::WorkerCrash), None, None)
                .await;
        }
    }

    /// Jobs stuck `pending` past the reaper's grace period never reached
    /// a worker (broker outage, operator error); fail them rather than
    /// leaving them invisible forever.
    async fn sweep_stale_pending(&self) {
        let cutoff = chrono::Utc::now() - self.grace_period;
        let stale = match self.job_repo.list_stale_pending(cutoff).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "list_stale_pending failed");
                return;
            }
        };

        for job in stale {
            info!(job_id = %job.id, "job exceeded enqueue-timeout grace period");
            let _ = self
                .job_repo
                .set_status(job.id, JobStatus::Failed, Some(StageErrorKind::EnqueueTimeout), None, None)
                .await;
        }
    }
}
