//! GitHub pull-request collaborator for the `docs-plus-comments` variant.
//!
//! The teacher's own `buildit_api::services::github::GitHubClient` talks
//! to the GitHub REST API with raw `reqwest` calls for read-only
//! operations (user/repo lookup, webhook creation). Opening a pull
//! request needs a multi-step write flow (branch ref, blob/tree/commit,
//! PR) that the pack's manifest set resolves with `octocrab`
//! (referenced in `other_examples/manifests/gotempsh-temps/Cargo.toml`);
//! we use it here rather than hand-rolling the git data API over
//! `reqwest`.

use octocrab::Octocrab;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("github api error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("source is not a github repository: {0}")]
    NotGitHub(String),
}

/// Parsed `owner/repo` from a normalized source locator.
pub fn owner_repo(source: &str) -> Result<(String, String), GitHubError> {
    let url = url::Url::parse(source).map_err(|_| GitHubError::NotGitHub(source.to_string()))?;
    if url.host_str() != Some("github.com") {
        return Err(GitHubError::NotGitHub(source.to_string()));
    }
    let mut segments = url
        .path_segments()
        .ok_or_else(|| GitHubError::NotGitHub(source.to_string()))?;
    let owner = segments
        .next()
        .ok_or_else(|| GitHubError::NotGitHub(source.to_string()))?;
    let repo = segments
        .next()
        .ok_or_else(|| GitHubError::NotGitHub(source.to_string()))?;
    Ok((owner.to_string(), repo.to_string()))
}

/// Opens a pull request carrying per-file commented source onto a new
/// branch off the repository's default branch.
pub struct PrPublisher {
    client: Octocrab,
}

impl PrPublisher {
    pub fn new(token: String) -> Result<Self, GitHubError> {
        let client = Octocrab::builder().personal_token(token).build()?;
        Ok(Self { client })
    }

    /// `files` is `(relative path, commented content)`.
    pub async fn open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        job_id: &str,
        files: &[(std::path::PathBuf, String)],
    ) -> Result<String, GitHubError> {
        let repo_info = self.client.repos(owner, repo).get().await?;
        let default_branch = repo_info.default_branch.unwrap_or_else(|| "main".to_string());

        let base_ref = self
            .client
            .repos(owner, repo)
            .get_ref(&octocrab::params::repos::Reference::Branch(
                default_branch.clone(),
            ))
            .await?;
        let base_sha = match base_ref.object {
            octocrab::models::repos::Object::Commit { sha, .. } => sha,
            octocrab::models::repos::Object::Tag { sha, .. } => sha,
            _ => return Err(GitHubError::NotGitHub(format!("{owner}/{repo}"))),
        };

        let branch_name = format!("docugen/{job_id}");
        self.client
            .repos(owner, repo)
            .create_ref(
                &octocrab::params::repos::Reference::Branch(branch_name.clone()),
                base_sha,
            )
            .await?;

        for (path, content) in files {
            let path_str = path.to_string_lossy().to_string();
            let existing = self
                .client
                .repos(owner, repo)
                .get_content()
                .path(&path_str)
                .r#ref(&branch_name)
                .send()
                .await
                .ok();

            let message = format!("docs: add generated comments to {path_str}");
            let contents = self.client.repos(owner, repo);
            let result = match existing.and_then(|mut c| c.take_items().into_iter().next()) {
                Some(item) => {
                    contents
                        .update_file(&path_str, &message, content.clone(), &item.sha)
                        .branch(&branch_name)
                        .send()
                        .await
                }
                None => {
                    contents
                        .create_file(&path_str, &message, content.clone())
                        .branch(&branch_name)
                        .send()
                        .await
                }
            };

            if let Err(e) = result {
                warn!(job_id, path = %path_str, error = %e, "failed to commit commented file");
            }
        }

        let pr = self
            .client
            .pulls(owner, repo)
            .create(
                format!("Add AI-generated inline comments (job {job_id})"),
                branch_name,
                default_branch,
            )
            .body("Generated automatically by the documentation job orchestration engine.")
            .send()
            .await?;

        info!(job_id, pr_url = ?pr.html_url, "opened pull request");
        Ok(pr
            .html_url
            .map(|u| u.to_string())
            .unwrap_or_else(|| format!("https://github.com/{owner}/{repo}/pull/{}", pr.number)))
    }
}
