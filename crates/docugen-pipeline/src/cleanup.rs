//! S6 Cleanup — remove the per-job workspace. Never fails the run: a
//! cleanup failure is logged and otherwise ignored, per spec.md §4.5 S6.

use async_trait::async_trait;
use docugen_core::{RunState, WorkspaceCleaner};
use tracing::warn;

pub struct Cleaner;

#[async_trait]
impl WorkspaceCleaner for Cleaner {
    async fn cleanup(&self, state: &mut RunState) {
        if let Err(e) = tokio::fs::remove_dir_all(&state.workspace).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(job_id = %state.job_id, workspace = %state.workspace.display(), error = %e, "failed to remove job workspace");
            }
        }
    }
}
