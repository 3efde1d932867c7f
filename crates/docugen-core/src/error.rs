//! Error types for the documentation job orchestration engine.

use thiserror::Error;

/// General-purpose crate error, used where a specific stage/error
/// taxonomy doesn't apply.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy a pipeline stage can surface. Each variant's
/// `Display` form is exactly the short phrase stored on `Job.error`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageErrorKind {
    #[error("invalid-source")]
    InvalidSource,

    #[error("repo-not-found")]
    RepoNotFound,

    #[error("auth-denied")]
    AuthDenied,

    #[error("network")]
    Network,

    #[error("fetch-timeout")]
    FetchTimeout,

    #[error("io-error")]
    IoError,

    #[error("no-analyzable-files")]
    NoAnalyzableFiles,

    #[error("model-unavailable")]
    ModelUnavailable,

    #[error("model-rate-limited")]
    ModelRateLimited,

    #[error("model-rejected")]
    ModelRejected,

    #[error("empty-output")]
    EmptyOutput,

    #[error("publish-failed")]
    PublishFailed,

    #[error("timed-out")]
    TimedOut,

    #[error("deadline-exceeded")]
    DeadlineExceeded,

    #[error("worker-crash")]
    WorkerCrash,

    #[error("enqueue-timeout")]
    EnqueueTimeout,
}

impl StageErrorKind {
    /// Whether this error ends the job in `failed` rather than being
    /// retried transparently by the broker.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            StageErrorKind::ModelUnavailable | StageErrorKind::ModelRateLimited
        )
    }

    /// Whether the broker should redeliver the work item for this error.
    pub fn is_broker_retryable(&self) -> bool {
        matches!(
            self,
            StageErrorKind::Network
                | StageErrorKind::FetchTimeout
                | StageErrorKind::ModelUnavailable
                | StageErrorKind::ModelRateLimited
                | StageErrorKind::WorkerCrash
        )
    }
}
