//! `/v1/jobs` routes, implementing spec.md §6's table exactly.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use docugen_core::{Job, JobVariant, ResourceId};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::submit::{self, SubmitOutcome, SubmitRequest};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_job).get(list_jobs))
        .route("/{id}", get(get_job).delete(delete_job))
        .route("/{id}/artifact", get(get_artifact))
}

#[derive(Debug, Deserialize)]
struct CreateJobRequest {
    source: String,
    caller_id: Option<String>,
    credential: Option<String>,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    has_write_access: bool,
}

#[derive(Debug, Serialize)]
struct JobResponse {
    id: ResourceId,
    source: String,
    status: String,
    error: Option<String>,
    artifact_url: Option<String>,
    pull_request_url: Option<String>,
    has_write_access: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            source: job.source,
            status: job.status.to_string(),
            error: job.error,
            artifact_url: job.artifact_url,
            pull_request_url: job.pull_request_url,
            has_write_access: job.has_write_access,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<Response, ApiError> {
    let variant = match req.variant.as_deref() {
        None => JobVariant::default(),
        Some(raw) => raw
            .parse::<JobVariant>()
            .map_err(|_| ApiError::BadRequest(format!("unrecognized variant: {raw}")))?,
    };

    let outcome = submit::submit(
        state.job_repo.as_ref(),
        state.broker.as_ref(),
        SubmitRequest {
            source: req.source,
            caller_id: req.caller_id,
            credential: req.credential,
            variant,
            has_write_access: req.has_write_access,
        },
    )
    .await?;

    let (status, job) = match outcome {
        SubmitOutcome::Created(job) => (StatusCode::CREATED, job),
        SubmitOutcome::Existing(job) => (StatusCode::OK, job),
    };

    Ok((status, Json(JobResponse::from(job))).into_response())
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.job_repo.get(id).await?;
    Ok(Json(job.into()))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    skip: Option<i64>,
    limit: Option<i64>,
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<JobResponse>>, ApiError> {
    let skip = query.skip.unwrap_or(0).max(0);
    let limit = query.limit.unwrap_or(100).clamp(1, 100);
    let jobs = state.job_repo.list(skip, limit).await?;
    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}

async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
) -> Result<StatusCode, ApiError> {
    state.job_repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Streams the generated document from its local path, or redirects to
/// the Artifact Store Gateway URL when the artifact was uploaded there,
/// per spec.md §6's `GET /v1/jobs/{id}/artifact` row.
async fn get_artifact(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
) -> Result<Response, ApiError> {
    let job = state.job_repo.get(id).await?;

    if job.status != docugen_core::JobStatus::Completed {
        return Err(ApiError::Conflict(format!(
            "job {id} is not completed (status: {})",
            job.status
        )));
    }

    let Some(url) = job.artifact_url else {
        return Err(ApiError::NotFound(format!(
            "job {id} has no published artifact"
        )));
    };

    if let Some(path) = url.strip_prefix("file://") {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to read local artifact: {e}")))?;
        return Ok((
            [(header::CONTENT_TYPE, "text/markdown")],
            Bytes::from(bytes),
        )
            .into_response());
    }

    Ok(Redirect::temporary(&url).into_response())
}
