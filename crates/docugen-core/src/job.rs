//! The durable job record and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ResourceId;

/// Status of a documentation job. Transitions only move forward along
/// `Pending -> Processing -> {Completed, Failed}`; there is no revival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Predecessor statuses from which `self` may be reached.
    pub fn allowed_predecessors(self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Processing => &[JobStatus::Pending],
            JobStatus::Completed => &[JobStatus::Processing],
            JobStatus::Failed => &[JobStatus::Pending, JobStatus::Processing],
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pipeline variant a job requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobVariant {
    /// Documentation only.
    Docs,
    /// Documentation plus an inline-comment pull request (or bundle).
    DocsPlusComments,
}

impl std::str::FromStr for JobVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "docs" => Ok(JobVariant::Docs),
            "docs+comments" => Ok(JobVariant::DocsPlusComments),
            other => Err(format!("unknown job variant: {other}")),
        }
    }
}

impl std::fmt::Display for JobVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobVariant::Docs => "docs",
            JobVariant::DocsPlusComments => "docs+comments",
        };
        f.write_str(s)
    }
}

impl Default for JobVariant {
    fn default() -> Self {
        JobVariant::Docs
    }
}

/// The durable record of a single documentation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: ResourceId,
    /// Normalized source-repository locator.
    pub source: String,
    pub status: JobStatus,
    /// One-line human-readable error, set only when `status == Failed`.
    pub error: Option<String>,
    /// Published documentation artifact URL, set when `status == Completed`.
    pub artifact_url: Option<String>,
    /// Caller-supplied identifier, opaque to this crate.
    pub caller_id: Option<String>,
    /// Whether the caller confirmed write access to the source repository.
    pub has_write_access: bool,
    /// Pull-request URL opened for the `docs+comments` variant.
    pub pull_request_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Whether this job may transition to `next` per invariant 1.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.allowed_predecessors().contains(&self.status)
    }

    /// Whether this job satisfies invariant 3 (completed => has an
    /// artifact or PR URL) and invariant 4 (failed => has an error).
    pub fn satisfies_terminal_invariants(&self) -> bool {
        match self.status {
            JobStatus::Completed => self.artifact_url.is_some() || self.pull_request_url.is_some(),
            JobStatus::Failed => self.error.as_deref().is_some_and(|e| !e.is_empty()),
            _ => true,
        }
    }
}

/// Normalize a source-repository locator: lowercase host, strip a
/// trailing slash, strip a trailing `.git` suffix. This is the
/// normalization rule referenced by the uniqueness invariant, kept as a
/// standalone testable function per the Design Note on locator
/// uniqueness.
pub fn normalize_source(raw: &str) -> Result<String, crate::Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(crate::Error::InvalidInput("empty source".to_string()));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| crate::Error::InvalidInput(format!("invalid source url: {e}")))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(crate::Error::InvalidInput(
            "source must be an http(s) url".to_string(),
        ));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| crate::Error::InvalidInput("source url has no host".to_string()))?
        .to_lowercase();

    let mut path = parsed.path().trim_end_matches('/').to_string();
    if let Some(stripped) = path.strip_suffix(".git") {
        path = stripped.to_string();
    }

    let port = parsed
        .port()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();

    Ok(format!("{}://{}{}{}", parsed.scheme(), host, port, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_trailing_slash_and_git_suffix() {
        assert_eq!(
            normalize_source("https://Example.com/Acme/Widget.git/").unwrap(),
            "https://example.com/Acme/Widget"
        );
    }

    #[test]
    fn normalize_lowercases_host_only() {
        assert_eq!(
            normalize_source("https://EXAMPLE.com/acme/widget").unwrap(),
            "https://example.com/acme/widget"
        );
    }

    #[test]
    fn normalize_rejects_non_http_scheme() {
        assert!(normalize_source("git@example.com:acme/widget.git").is_err());
    }

    #[test]
    fn transitions_are_forward_only() {
        let job = Job {
            id: ResourceId::new(),
            source: "https://example.com/a/b".to_string(),
            status: JobStatus::Pending,
            error: None,
            artifact_url: None,
            caller_id: None,
            has_write_access: false,
            pull_request_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(job.can_transition_to(JobStatus::Processing));
        assert!(job.can_transition_to(JobStatus::Failed));
        assert!(!job.can_transition_to(JobStatus::Completed));
    }
}
