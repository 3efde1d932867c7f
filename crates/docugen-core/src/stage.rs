//! Stage Tool trait surfaces.
//!
//! Each trait is a pure function over an explicit `RunState`: no shared
//! mutable state between tools, matching the teacher's `Executor` shape.
//! Implementations live in `docugen-pipeline`; this crate only declares
//! the seam so `docugen-worker` and tests can depend on it without
//! pulling in the pipeline's concrete I/O.

use async_trait::async_trait;

use crate::{RunState, StageErrorKind};

#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    async fn fetch(&self, state: &mut RunState) -> Result<(), StageErrorKind>;
}

#[async_trait]
pub trait TreeScanner: Send + Sync {
    async fn scan(&self, state: &mut RunState) -> Result<(), StageErrorKind>;
}

#[async_trait]
pub trait CodeAnalyzer: Send + Sync {
    async fn analyze(&self, state: &mut RunState) -> Result<(), StageErrorKind>;
}

#[async_trait]
pub trait DocGenerator: Send + Sync {
    async fn generate(&self, state: &mut RunState) -> Result<(), StageErrorKind>;
}

#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn publish(&self, state: &mut RunState) -> Result<(), StageErrorKind>;
}

#[async_trait]
pub trait WorkspaceCleaner: Send + Sync {
    async fn cleanup(&self, state: &mut RunState);
}
