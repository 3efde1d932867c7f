//! The Pipeline (C5): a plain linear driver over S1..S6, per spec.md
//! §4.5 and Design Note "Coroutine/async control flow" — no state
//! machine object, just an `async fn` and a `match`/`?`-chain.

use std::sync::Arc;

use docugen_core::{
    ArtifactPublisher, CodeAnalyzer, DocGenerator, RepositoryFetcher, RunState, StageErrorKind,
    StageName, TreeScanner, WorkspaceCleaner,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Bundles the Stage Tools a single Pipeline run needs. Each tool is
/// constructed once (with the slice of `Config` it needs) and shared
/// across every job the process handles.
pub struct Pipeline {
    pub fetcher: Arc<dyn RepositoryFetcher>,
    pub scanner: Arc<dyn TreeScanner>,
    pub analyzer: Arc<dyn CodeAnalyzer>,
    pub generator: Arc<dyn DocGenerator>,
    pub publisher: Arc<dyn ArtifactPublisher>,
    pub cleaner: Arc<dyn WorkspaceCleaner>,
}

impl Pipeline {
    /// Runs S1..S6 in order, stopping at the first stage error. Cleanup
    /// (S6) always runs, even on failure or cancellation, so the
    /// workspace never leaks. Checks `cancellation` between stages;
    /// mid-stage cancellation is each Stage Tool's own responsibility
    /// (e.g. `HttpModelClient`'s retry loop).
    pub async fn run(&self, mut state: RunState, cancellation: CancellationToken) -> RunState {
        let outcome = self.run_stages(&mut state, &cancellation).await;
        if let Err(err) = outcome {
            state.terminal_error = Some(err);
        }

        state.current_stage = StageName::Cleanup;
        self.cleaner.cleanup(&mut state).await;
        state
    }

    async fn run_stages(
        &self,
        state: &mut RunState,
        cancellation: &CancellationToken,
    ) -> Result<(), StageErrorKind> {
        state.current_stage = StageName::Fetch;
        info!(job_id = %state.job_id, stage = %state.current_stage, "running stage");
        self.fetcher.fetch(state).await?;
        if cancellation.is_cancelled() {
            return Err(StageErrorKind::TimedOut);
        }

        state.current_stage = StageName::Scan;
        info!(job_id = %state.job_id, stage = %state.current_stage, "running stage");
        self.scanner.scan(state).await?;
        if cancellation.is_cancelled() {
            return Err(StageErrorKind::TimedOut);
        }

        state.current_stage = StageName::Analyze;
        info!(job_id = %state.job_id, stage = %state.current_stage, "running stage");
        self.analyzer.analyze(state).await?;
        if cancellation.is_cancelled() {
            return Err(StageErrorKind::TimedOut);
        }

        state.current_stage = StageName::Generate;
        info!(job_id = %state.job_id, stage = %state.current_stage, "running stage");
        self.generator.generate(state).await?;
        if cancellation.is_cancelled() {
            return Err(StageErrorKind::TimedOut);
        }

        state.current_stage = StageName::Publish;
        info!(job_id = %state.job_id, stage = %state.current_stage, "running stage");
        self.publisher.publish(state).await?;

        Ok(())
    }
}
