//! The `JobRepo` trait and its PostgreSQL implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docugen_core::{Job, JobStatus, ResourceId, StageErrorKind};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::{DbError, DbResult};

/// Row shape mirroring the `jobs` table exactly.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
struct JobRecord {
    id: uuid::Uuid,
    source: String,
    status: String,
    error: Option<String>,
    artifact_url: Option<String>,
    caller_id: Option<String>,
    has_write_access: bool,
    pull_request_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRecord> for Job {
    type Error = DbError;

    fn try_from(r: JobRecord) -> DbResult<Job> {
        let status = r
            .status
            .parse::<JobStatus>()
            .map_err(|e| DbError::Database(sqlx::Error::Decode(e.into())))?;
        Ok(Job {
            id: ResourceId::from_uuid(r.id),
            source: r.source,
            status,
            error: r.error,
            artifact_url: r.artifact_url,
            caller_id: r.caller_id,
            has_write_access: r.has_write_access,
            pull_request_url: r.pull_request_url,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Outcome of [`JobRepo::create`] distinguishing a fresh insert from an
/// existing row returned for an already-submitted source, per the
/// idempotent-submission invariant.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Job),
    Existing(Job),
}

#[async_trait]
pub trait JobRepo: Send + Sync {
    /// Atomically create a job for `normalized_source`, or return the
    /// already-existing non-failed job for that source.
    async fn create(
        &self,
        normalized_source: &str,
        caller_id: Option<&str>,
        has_write_access: bool,
    ) -> DbResult<CreateOutcome>;

    async fn get(&self, id: ResourceId) -> DbResult<Job>;

    async fn list(&self, skip: i64, limit: i64) -> DbResult<Vec<Job>>;

    /// Transition `id` to `next`, atomically checking the forward-only
    /// invariant. `error`/`artifact_url`/`pull_request_url` are set only
    /// when provided (all stay `NULL` otherwise).
    async fn set_status(
        &self,
        id: ResourceId,
        next: JobStatus,
        error: Option<StageErrorKind>,
        artifact_url: Option<&str>,
        pull_request_url: Option<&str>,
    ) -> DbResult<Job>;

    async fn delete(&self, id: ResourceId) -> DbResult<()>;

    /// Jobs still `pending` whose `created_at` is older than `older_than`,
    /// used by the reaper to apply `enqueue-timeout`.
    async fn list_stale_pending(&self, older_than: DateTime<Utc>) -> DbResult<Vec<Job>>;
}

/// PostgreSQL implementation of [`JobRepo`].
pub struct PgJobRepo {
    pool: PgPool,
}

impl PgJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepo for PgJobRepo {
    async fn create(
        &self,
        normalized_source: &str,
        caller_id: Option<&str>,
        has_write_access: bool,
    ) -> DbResult<CreateOutcome> {
        let inserted = sqlx::query_as::<_, JobRecord>(
            r#"
            INSERT INTO jobs (id, source, status, caller_id, has_write_access, created_at, updated_at)
            VALUES ($1, $2, 'pending', $3, $4, NOW(), NOW())
            ON CONFLICT (source) WHERE status <> 'failed' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(normalized_source)
        .bind(caller_id)
        .bind(has_write_access)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = inserted {
            return Ok(CreateOutcome::Created(record.try_into()?));
        }

        let existing = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs WHERE source = $1 AND status <> 'failed' ORDER BY created_at DESC LIMIT 1",
        )
        .bind(normalized_source)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("job for source {normalized_source}")))?;

        Ok(CreateOutcome::Existing(existing.try_into()?))
    }

    async fn get(&self, id: ResourceId) -> DbResult<Job> {
        let record = sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("job {id}")))?;
        record.try_into()
    }

    async fn list(&self, skip: i64, limit: i64) -> DbResult<Vec<Job>> {
        let records = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs ORDER BY created_at DESC OFFSET $1 LIMIT $2",
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        records.into_iter().map(Job::try_from).collect()
    }

    async fn set_status(
        &self,
        id: ResourceId,
        next: JobStatus,
        error: Option<StageErrorKind>,
        artifact_url: Option<&str>,
        pull_request_url: Option<&str>,
    ) -> DbResult<Job> {
        let allowed: Vec<&'static str> = next
            .allowed_predecessors()
            .iter()
            .map(|s| s.as_str())
            .collect();

        let record = sqlx::query_as::<_, JobRecord>(
            r#"
            UPDATE jobs
            SET status = $2,
                error = COALESCE($3, error),
                artifact_url = COALESCE($4, artifact_url),
                pull_request_url = COALESCE($5, pull_request_url),
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($6)
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(next.as_str())
        .bind(error.map(|e| e.to_string()))
        .bind(artifact_url)
        .bind(pull_request_url)
        .bind(&allowed)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::Conflict(format!("job {id} cannot transition to {next}")))?;

        record.try_into()
    }

    async fn delete(&self, id: ResourceId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("job {id}")));
        }
        Ok(())
    }

    async fn list_stale_pending(&self, older_than: DateTime<Utc>) -> DbResult<Vec<Job>> {
        let records = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs WHERE status = 'pending' AND created_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;
        records.into_iter().map(Job::try_from).collect()
    }
}
