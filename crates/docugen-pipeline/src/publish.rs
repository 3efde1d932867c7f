//! S5 Publish — write the generated documentation locally, mirror it to
//! the Artifact Store Gateway when configured, and (for `docs+comments`)
//! attempt a pull request before falling back to a commented-source
//! bundle.

use std::path::PathBuf;

use async_trait::async_trait;
use docugen_core::{ArtifactPublisher, ArtifactStore, RunState, StageErrorKind};
use serde::Serialize;
use tracing::{info, warn};

use crate::generate::HttpModelClient;
use crate::github::{owner_repo, PrPublisher};

#[derive(Serialize)]
struct CommentedFile {
    path: PathBuf,
    original: String,
    commented: String,
}

/// The `ArtifactPublisher` Stage Tool, per spec.md §4.5 S5.
pub struct Publisher {
    /// Root directory under which the durable local copy is written, at
    /// `{workspace_root}/docs/{job-id}` — distinct from `state.workspace`
    /// (`{workspace_root}/repos/{job-id}`), which Cleanup removes.
    workspace_root: PathBuf,
    store: Option<std::sync::Arc<dyn ArtifactStore>>,
    github_token: Option<String>,
    model: Option<HttpModelClient>,
    comment_token_budget: u32,
}

impl Publisher {
    pub fn new(
        workspace_root: PathBuf,
        store: Option<std::sync::Arc<dyn ArtifactStore>>,
        github_token: Option<String>,
        model: Option<HttpModelClient>,
        comment_token_budget: u32,
    ) -> Self {
        Self {
            workspace_root,
            store,
            github_token,
            model,
            comment_token_budget,
        }
    }

    async fn write_local(&self, state: &RunState, generated: &str) -> Result<PathBuf, StageErrorKind> {
        let out_dir = self.workspace_root.join("docs").join(state.job_id.to_string());
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|_| StageErrorKind::IoError)?;
        let out_path = out_dir.join("DOCUMENTATION.md");
        tokio::fs::write(&out_path, generated)
            .await
            .map_err(|_| StageErrorKind::IoError)?;
        Ok(out_path)
    }

    async fn upload_to_store(&self, state: &RunState, generated: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        if !store.configured() {
            return None;
        }
        let key = format!("docs/{}/DOCUMENTATION.md", state.job_id);
        match store
            .put(&key, generated.as_bytes().to_vec(), "text/markdown")
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(job_id = %state.job_id, error = %e, "artifact store upload failed, continuing with local copy");
                None
            }
        }
    }

    /// Generate commented source for the top analyzed files and attempt a
    /// pull request; on any failure, publish the `{path, original,
    /// commented}[]` bundle to the Artifact Store instead.
    async fn publish_comments(&self, state: &mut RunState) -> Result<(), StageErrorKind> {
        let Some(model) = &self.model else {
            return Ok(());
        };

        let mut commented_files = Vec::new();
        for analysis in state.analysis.iter().take(10) {
            let full_path = state.workspace.join(&analysis.path);
            let Ok(original) = tokio::fs::read_to_string(&full_path).await else {
                continue;
            };
            let prompt = format!(
                "Add concise inline comments explaining non-obvious logic to this {} file. \
                 Return only the full commented source, no markdown fences.\n\n{original}",
                analysis.language
            );
            match model.generate(&prompt, self.comment_token_budget).await {
                Ok(response) => commented_files.push(CommentedFile {
                    path: analysis.path.clone(),
                    original,
                    commented: response.text,
                }),
                Err(e) => {
                    warn!(job_id = %state.job_id, path = %analysis.path.display(), error = %e, "commented-source generation failed for file");
                }
            }
        }

        if commented_files.is_empty() {
            return Ok(());
        }

        let pr_url = if let (Some(token), Ok((owner, repo))) =
            (&self.github_token, owner_repo(&state.source))
        {
            match PrPublisher::new(token.clone()) {
                Ok(publisher) => {
                    let files: Vec<(PathBuf, String)> = commented_files
                        .iter()
                        .map(|f| (f.path.clone(), f.commented.clone()))
                        .collect();
                    publisher
                        .open_pull_request(&owner, &repo, &state.job_id.to_string(), &files)
                        .await
                        .map_err(|e| {
                            warn!(job_id = %state.job_id, error = %e, "pull request creation failed, falling back to bundle");
                            e
                        })
                        .ok()
                }
                Err(e) => {
                    warn!(job_id = %state.job_id, error = %e, "could not build github client, falling back to bundle");
                    None
                }
            }
        } else {
            None
        };

        if let Some(url) = pr_url {
            state.pull_request_url = Some(url);
            return Ok(());
        }

        if let Some(store) = &self.store {
            if store.configured() {
                let bundle = serde_json::to_vec(&commented_files)
                    .map_err(|_| StageErrorKind::PublishFailed)?;
                let key = format!("commented/{}/bundle.json", state.job_id);
                match store.put(&key, bundle, "application/json").await {
                    Ok(url) => {
                        state.pull_request_url = Some(url);
                        return Ok(());
                    }
                    Err(e) => warn!(job_id = %state.job_id, error = %e, "bundle upload also failed"),
                }
            }
        }

        // Both the PR and its bundle fallback failed: per spec.md §4.5 S5,
        // bundle-publication failure in the comments variant is terminal.
        Err(StageErrorKind::PublishFailed)
    }
}

#[async_trait]
impl ArtifactPublisher for Publisher {
    async fn publish(&self, state: &mut RunState) -> Result<(), StageErrorKind> {
        let Some(generated) = state.generated.clone() else {
            return Err(StageErrorKind::PublishFailed);
        };

        let local_path = self.write_local(state, &generated).await?;
        info!(job_id = %state.job_id, path = %local_path.display(), "wrote documentation locally");

        if let Some(url) = self.upload_to_store(state, &generated).await {
            state.artifact_url = Some(url);
        }

        if state.variant == docugen_core::JobVariant::DocsPlusComments {
            self.publish_comments(state).await?;
        }

        if state.artifact_url.is_none() && state.pull_request_url.is_none() {
            state.artifact_url = Some(format!("file://{}", local_path.display()));
        }

        Ok(())
    }
}
