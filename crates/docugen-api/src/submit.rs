//! The Submitter (C3): normalize, de-duplicate, persist, enqueue.
//!
//! Implements spec.md §4.3's four numbered steps as a single function so
//! the HTTP route handler stays a thin translation to/from JSON, the way
//! `buildit_api::routes::pipelines::create_pipeline` defers to
//! `PipelineRepo` rather than inlining SQL.

use std::sync::Arc;

use chrono::Utc;
use docugen_core::{normalize_source, Job, JobVariant, ResourceId, WorkItem};
use docugen_db::{CreateOutcome, JobRepo};
use docugen_queue::TaskBroker;
use tracing::{error, warn};

use crate::error::ApiError;

/// Distinguishes a fresh 201 from a 200-returning-existing response, per
/// §6's status table and end-to-end scenario 2 (duplicate submit).
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Created(Job),
    Existing(Job),
}

pub struct SubmitRequest {
    pub source: String,
    pub caller_id: Option<String>,
    pub credential: Option<String>,
    pub variant: JobVariant,
    pub has_write_access: bool,
}

/// Normalize, create-or-return-existing, and enqueue. If enqueue fails
/// after the Job record is already committed `Pending`, the Job is left
/// as-is rather than retried synchronously (§4.3 step 4) — the reaper's
/// stale-`pending` sweep (see [`reap_stale_pending`]) eventually drives it
/// to `failed` with `enqueue-timeout`.
pub async fn submit(
    job_repo: &dyn JobRepo,
    broker: &dyn TaskBroker,
    req: SubmitRequest,
) -> Result<SubmitOutcome, ApiError> {
    let normalized = normalize_source(&req.source)?;

    let outcome = job_repo
        .create(&normalized, req.caller_id.as_deref(), req.has_write_access)
        .await?;

    let (job, is_new) = match outcome {
        CreateOutcome::Created(job) => (job, true),
        CreateOutcome::Existing(job) => (job, false),
    };

    if !is_new {
        return Ok(SubmitOutcome::Existing(job));
    }

    let item = WorkItem {
        job_id: job.id,
        credential: req.credential,
        variant: req.variant,
    };

    if let Err(e) = broker.enqueue(&item).await {
        // The Job stays `pending`; do not retry synchronously per §4.3
        // step 4 — the reaper's grace-period sweep will eventually apply
        // `enqueue-timeout` if no worker ever picks this job up.
        warn!(job_id = %job.id, error = %e, "enqueue failed after job was created, leaving job pending");
    }

    Ok(SubmitOutcome::Created(job))
}

/// One-shot sweep driving every `pending` Job older than `grace_period`
/// to `failed` with `enqueue-timeout`, per §4.3 step 4 / §7's error
/// taxonomy. Exposed as a library function so both `docugen-cli reap`
/// (an operator-invoked one-shot command) and the Worker Runtime's
/// periodic `Reaper` can share the same logic without depending on each
/// other's crate.
pub async fn reap_stale_pending(
    job_repo: &Arc<dyn JobRepo>,
    grace_period: chrono::Duration,
) -> Result<Vec<ResourceId>, ApiError> {
    let cutoff = Utc::now() - grace_period;
    let stale = job_repo.list_stale_pending(cutoff).await?;

    let mut reaped = Vec::new();
    for job in stale {
        match job_repo
            .set_status(
                job.id,
                docugen_core::JobStatus::Failed,
                Some(docugen_core::StageErrorKind::EnqueueTimeout),
                None,
                None,
            )
            .await
        {
            Ok(_) => reaped.push(job.id),
            Err(e) => error!(job_id = %job.id, error = %e, "failed to reap stale pending job"),
        }
    }
    Ok(reaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docugen_core::JobStatus;
    use docugen_db::DbResult;
    use docugen_queue::{NackOutcome, QueueResult, ReapOutcome, ReservationHandle};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeJobRepo {
        jobs: Mutex<Vec<Job>>,
    }

    #[async_trait]
    impl JobRepo for FakeJobRepo {
        async fn create(
            &self,
            normalized_source: &str,
            caller_id: Option<&str>,
            has_write_access: bool,
        ) -> DbResult<CreateOutcome> {
            let mut jobs = self.jobs.lock().unwrap();
            if let Some(existing) = jobs
                .iter()
                .find(|j| j.source == normalized_source && j.status != JobStatus::Failed)
            {
                return Ok(CreateOutcome::Existing(existing.clone()));
            }
            let job = Job {
                id: ResourceId::new(),
                source: normalized_source.to_string(),
                status: JobStatus::Pending,
                error: None,
                artifact_url: None,
                caller_id: caller_id.map(String::from),
                has_write_access,
                pull_request_url: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            jobs.push(job.clone());
            Ok(CreateOutcome::Created(job))
        }

        async fn get(&self, id: ResourceId) -> DbResult<Job> {
            self.jobs
                .lock()
                .unwrap()
                .iter()
                .find(|j| j.id == id)
                .cloned()
                .ok_or_else(|| docugen_db::DbError::NotFound(id.to_string()))
        }

        async fn list(&self, _skip: i64, _limit: i64) -> DbResult<Vec<Job>> {
            Ok(self.jobs.lock().unwrap().clone())
        }

        async fn set_status(
            &self,
            id: ResourceId,
            next: JobStatus,
            error: Option<docugen_core::StageErrorKind>,
            artifact_url: Option<&str>,
            pull_request_url: Option<&str>,
        ) -> DbResult<Job> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .iter_mut()
                .find(|j| j.id == id)
                .ok_or_else(|| docugen_db::DbError::NotFound(id.to_string()))?;
            if !job.can_transition_to(next) {
                return Err(docugen_db::DbError::Conflict(format!(
                    "{} cannot transition to {}",
                    id, next
                )));
            }
            job.status = next;
            if let Some(e) = error {
                job.error = Some(e.to_string());
            }
            if let Some(url) = artifact_url {
                job.artifact_url = Some(url.to_string());
            }
            if let Some(url) = pull_request_url {
                job.pull_request_url = Some(url.to_string());
            }
            Ok(job.clone())
        }

        async fn delete(&self, id: ResourceId) -> DbResult<()> {
            let mut jobs = self.jobs.lock().unwrap();
            let before = jobs.len();
            jobs.retain(|j| j.id != id);
            if jobs.len() == before {
                return Err(docugen_db::DbError::NotFound(id.to_string()));
            }
            Ok(())
        }

        async fn list_stale_pending(
            &self,
            older_than: chrono::DateTime<Utc>,
        ) -> DbResult<Vec<Job>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.status == JobStatus::Pending && j.created_at < older_than)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeBroker {
        enqueued: Mutex<Vec<WorkItem>>,
    }

    #[async_trait]
    impl TaskBroker for FakeBroker {
        async fn enqueue(&self, item: &WorkItem) -> QueueResult<()> {
            self.enqueued.lock().unwrap().push(item.clone());
            Ok(())
        }

        async fn reserve(
            &self,
            _poll_timeout: Duration,
            _visibility_timeout: Duration,
        ) -> QueueResult<Option<(WorkItem, ReservationHandle)>> {
            Ok(None)
        }

        async fn ack(&self, _handle: ReservationHandle) -> QueueResult<()> {
            Ok(())
        }

        async fn nack(
            &self,
            _handle: ReservationHandle,
            _retryable: bool,
            _poison_pill_threshold: u32,
        ) -> QueueResult<NackOutcome> {
            Ok(NackOutcome::Requeued)
        }

        async fn reap_expired(&self, _poison_pill_threshold: u32) -> QueueResult<Vec<ReapOutcome>> {
            Ok(vec![])
        }
    }

    fn request(source: &str) -> SubmitRequest {
        SubmitRequest {
            source: source.to_string(),
            caller_id: None,
            credential: None,
            variant: JobVariant::Docs,
            has_write_access: false,
        }
    }

    #[tokio::test]
    async fn submitting_twice_returns_existing_the_second_time() {
        let repo = FakeJobRepo::default();
        let broker = FakeBroker::default();

        let first = submit(&repo, &broker, request("https://example.com/acme/widget"))
            .await
            .unwrap();
        let second = submit(
            &repo,
            &broker,
            request("https://EXAMPLE.com/acme/widget.git/"),
        )
        .await
        .unwrap();

        let SubmitOutcome::Created(first_job) = first else {
            panic!("expected Created");
        };
        let SubmitOutcome::Existing(second_job) = second else {
            panic!("expected Existing");
        };
        assert_eq!(first_job.id, second_job.id);
        assert_eq!(broker.enqueued.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resubmitting_after_failure_creates_a_new_job() {
        let repo = FakeJobRepo::default();
        let broker = FakeBroker::default();

        let SubmitOutcome::Created(job) =
            submit(&repo, &broker, request("https://example.com/acme/widget"))
                .await
                .unwrap()
        else {
            panic!("expected Created");
        };
        repo.set_status(
            job.id,
            JobStatus::Failed,
            Some(docugen_core::StageErrorKind::RepoNotFound),
            None,
            None,
        )
        .await
        .unwrap();

        let resubmitted = submit(&repo, &broker, request("https://example.com/acme/widget"))
            .await
            .unwrap();
        let SubmitOutcome::Created(new_job) = resubmitted else {
            panic!("expected a fresh Created after the prior job failed");
        };
        assert_ne!(new_job.id, job.id);
    }

    #[tokio::test]
    async fn invalid_source_is_rejected_before_touching_the_repo() {
        let repo = FakeJobRepo::default();
        let broker = FakeBroker::default();
        let result = submit(&repo, &broker, request("not-a-url")).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
