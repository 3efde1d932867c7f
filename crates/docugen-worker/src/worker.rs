//! A single worker's claim/execute/ack loop.
//!
//! Grounded on `buildit_scheduler::worker::Worker`: an id, a queue
//! handle, an executor, and a `run` loop that matches on the claim
//! result. We generalize `claim`/`complete` to the Task Broker's
//! `reserve`/`ack`/`nack` and replace the single-executor call with the
//! full Pipeline run, per spec.md §4.4's 8-step Worker Runtime contract.

use std::sync::Arc;
use std::time::Duration;

use docugen_config::Config;
use docugen_core::{Job, JobStatus, JobVariant, RunState};
use docugen_db::JobRepo;
use docugen_pipeline::Pipeline;
use docugen_queue::{NackOutcome, ReservationHandle, TaskBroker};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const POLL_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Worker {
    id: String,
    broker: Arc<dyn TaskBroker>,
    job_repo: Arc<dyn JobRepo>,
    pipeline: Arc<Pipeline>,
    config: Arc<Config>,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        broker: Arc<dyn TaskBroker>,
        job_repo: Arc<dyn JobRepo>,
        pipeline: Arc<Pipeline>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            id: id.into(),
            broker,
            job_repo,
            pipeline,
            config,
        }
    }

    /// Runs until `shutdown` is cancelled. Each iteration is one
    /// reserve/execute/ack cycle; a reserve that finds nothing loops
    /// back around immediately (the broker itself blocks for
    /// `POLL_TIMEOUT`).
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(worker_id = %self.id, "starting worker");

        loop {
            let reserved = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(worker_id = %self.id, "shutdown requested, stopping worker");
                    return;
                }
                result = self.broker.reserve(POLL_TIMEOUT, self.config.broker_visibility_timeout) => result,
            };

            match reserved {
                Ok(Some((item, handle))) => {
                    self.handle_item(item.job_id.to_string(), item.variant, item.credential, handle, &shutdown)
                        .await;
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!(worker_id = %self.id, error = %e, "failed to reserve from broker");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn handle_item(
        &self,
        job_id: String,
        variant: JobVariant,
        credential: Option<String>,
        handle: ReservationHandle,
        shutdown: &CancellationToken,
    ) {
        let Ok(resource_id) = job_id.parse() else {
            warn!(worker_id = %self.id, job_id, "work item carried an unparseable job id, dropping");
            let _ = self.broker.ack(handle).await;
            return;
        };

        let job = match self.job_repo.get(resource_id).await {
            Ok(job) => job,
            Err(_) => {
                // Job was deleted by an operator after enqueue; drop it
                // idempotently rather than retrying forever.
                info!(worker_id = %self.id, %resource_id, "job no longer exists, dropping work item");
                let _ = self.broker.ack(handle).await;
                return;
            }
        };

        let job = match job.status {
            JobStatus::Completed | JobStatus::Failed => {
                info!(worker_id = %self.id, %resource_id, status = %job.status, "job already terminal, dropping work item");
                let _ = self.broker.ack(handle).await;
                return;
            }
            JobStatus::Processing => {
                // A redelivery of a non-terminal stage error (e.g. the
                // model stayed unavailable past its own retry budget):
                // the job never left `processing`, so there is no further
                // transition to make before re-running the pipeline.
                job
            }
            JobStatus::Pending => {
                match self
                    .job_repo
                    .set_status(resource_id, JobStatus::Processing, None, None, None)
                    .await
                {
                    Ok(updated) => updated,
                    Err(_) => {
                        // Lost the race to transition this job; another
                        // worker (or the reaper) got there first.
                        let _ = self.broker.ack(handle).await;
                        return;
                    }
                }
            }
        };

        self.execute(job, variant, credential, handle, shutdown).await;
    }

    async fn execute(
        &self,
        job: Job,
        variant: JobVariant,
        credential: Option<String>,
        handle: ReservationHandle,
        shutdown: &CancellationToken,
    ) {
        let workspace = self.config.workspace_root.join("repos").join(job.id.to_string());
        let run_state = RunState::new(
            job.id,
            job.source.clone(),
            credential,
            variant,
            job.has_write_access,
            workspace.clone(),
        );

        let cancel = CancellationToken::new();
        let soft_deadline = self.config.job_deadline_soft;
        let soft_canceller = cancel.clone();
        let soft_timer = tokio::spawn(async move {
            tokio::time::sleep(soft_deadline).await;
            soft_canceller.cancel();
        });

        let pipeline = Arc::clone(&self.pipeline);
        let run_future = pipeline.run(run_state, cancel.clone());

        let outcome = tokio::select! {
            result = tokio::time::timeout(self.config.job_deadline_hard, run_future) => result,
            _ = shutdown.cancelled() => {
                cancel.cancel();
                soft_timer.abort();
                // Let the in-flight run observe the cancellation and
                // finish its own cleanup rather than abandoning the
                // workspace; re-queue so another worker (or this one,
                // after restart) can pick the job back up.
                let _ = self
                    .broker
                    .nack(handle, true, self.config.broker_poison_pill_threshold)
                    .await;
                return;
            }
        };
        soft_timer.abort();

        match outcome {
            Ok(final_state) => self.finish(job.id, final_state.terminal_error, final_state, handle).await,
            Err(_elapsed) => {
                error!(worker_id = %self.id, job_id = %job.id, "job exceeded hard deadline, abandoning run");
                // The pipeline future was dropped by `timeout`, so its own
                // Cleanup tail never ran; remove the workspace ourselves.
                if let Err(e) = tokio::fs::remove_dir_all(&workspace).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(worker_id = %self.id, job_id = %job.id, workspace = %workspace.display(), error = %e, "failed to remove job workspace after hard deadline");
                    }
                }
                let _ = self
                    .broker
                    .nack(handle, false, self.config.broker_poison_pill_threshold)
                    .await;
                let _ = self
                    .job_repo
                    .set_status(
                        job.id,
                        JobStatus::Failed,
                        Some(docugen_core::StageErrorKind::DeadlineExceeded),
                        None,
                        None,
                    )
                    .await;
            }
        }
    }

    async fn finish(
        &self,
        job_id: docugen_core::ResourceId,
        terminal_error: Option<docugen_core::StageErrorKind>,
        final_state: RunState,
        handle: ReservationHandle,
    ) {
        match terminal_error {
            None => {
                let result = self
                    .job_repo
                    .set_status(
                        job_id,
                        JobStatus::Completed,
                        None,
                        final_state.artifact_url.as_deref(),
                        final_state.pull_request_url.as_deref(),
                    )
                    .await;
                if let Err(e) = result {
                    error!(worker_id = %self.id, %job_id, error = %e, "failed to mark job completed");
                }
                let _ = self.broker.ack(handle).await;
            }
            Some(kind) if kind.is_broker_retryable() => {
                match self
                    .broker
                    .nack(handle, true, self.config.broker_poison_pill_threshold)
                    .await
                {
                    Ok(NackOutcome::Requeued) => {
                        info!(worker_id = %self.id, %job_id, error = %kind, "transient stage error, requeued");
                    }
                    Ok(NackOutcome::Abandoned { delivery_count }) => {
                        warn!(worker_id = %self.id, %job_id, error = %kind, delivery_count, "poison-pill threshold reached, failing job");
                        let _ = self
                            .job_repo
                            .set_status(job_id, JobStatus::Failed, Some(kind), None, None)
                            .await;
                    }
                    Err(_) => {
                        let _ = self
                            .job_repo
                            .set_status(job_id, JobStatus::Failed, Some(kind), None, None)
                            .await;
                    }
                }
            }
            Some(kind) => {
                let _ = self
                    .job_repo
                    .set_status(job_id, JobStatus::Failed, Some(kind), None, None)
                    .await;
                let _ = self
                    .broker
                    .nack(handle, false, self.config.broker_poison_pill_threshold)
                    .await;
            }
        }
    }
}
