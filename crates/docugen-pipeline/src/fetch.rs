//! S1 Fetch — obtain a shallow snapshot of the default branch.
//!
//! Grounded directly on `buildit_api::services::git::GitService`: shells
//! out to the system `git` via `tokio::process::Command`, applies the
//! caller's credential by interpolating it into the HTTPS URL userinfo,
//! and redacts it from any error text the same way.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use docugen_core::{FetchMetadata, RepositoryFetcher, RunState, StageErrorKind};
use tokio::process::Command;
use tracing::{info, warn};

/// Fetches a repository's default branch with `git clone --depth 1`.
pub struct GitFetcher {
    timeout: Duration,
}

impl GitFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Insert a bearer credential into an `https://` URL's userinfo, as
    /// `GitService::clone_and_scan` does for GitHub personal access tokens.
    fn authenticated_url(source: &str, credential: Option<&str>) -> String {
        match (credential, source.strip_prefix("https://")) {
            (Some(token), Some(rest)) => format!("https://{token}@{rest}"),
            _ => source.to_string(),
        }
    }

    fn classify_failure(stderr: &str) -> StageErrorKind {
        let lower = stderr.to_lowercase();
        if lower.contains("not found") || lower.contains("does not exist") {
            StageErrorKind::RepoNotFound
        } else if lower.contains("authentication failed")
            || lower.contains("403")
            || lower.contains("permission denied")
        {
            StageErrorKind::AuthDenied
        } else {
            StageErrorKind::Network
        }
    }

    async fn run_git(args: &[&str], cwd: Option<&std::path::Path>) -> std::io::Result<std::process::Output> {
        let mut cmd = Command::new("git");
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        cmd.output().await
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    async fn fetch(&self, state: &mut RunState) -> Result<(), StageErrorKind> {
        let auth_url = Self::authenticated_url(&state.source, state.credential.as_deref());
        let target = state.workspace.clone();

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|_| StageErrorKind::IoError)?;
        }

        info!(job_id = %state.job_id, "fetching repository");

        let clone = tokio::time::timeout(
            self.timeout,
            Self::run_git(
                &[
                    "clone",
                    "--depth",
                    "1",
                    "--single-branch",
                    &auth_url,
                    target.to_str().ok_or(StageErrorKind::IoError)?,
                ],
                None,
            ),
        )
        .await
        .map_err(|_| StageErrorKind::FetchTimeout)?
        .map_err(|_| StageErrorKind::Network)?;

        if !clone.status.success() {
            let stderr = String::from_utf8_lossy(&clone.stderr);
            let redacted = match state.credential.as_deref() {
                Some(token) => stderr.replace(token, "[REDACTED]"),
                None => stderr.to_string(),
            };
            warn!(job_id = %state.job_id, stderr = %redacted, "git clone failed");
            return Err(Self::classify_failure(&stderr));
        }

        let meta = Self::run_git(
            &["log", "-1", "--format=%H%n%an%n%s"],
            Some(&target),
        )
        .await
        .map_err(|_| StageErrorKind::IoError)?;

        let branch = Self::run_git(&["rev-parse", "--abbrev-ref", "HEAD"], Some(&target))
            .await
            .map_err(|_| StageErrorKind::IoError)?;

        let mut lines = String::from_utf8_lossy(&meta.stdout).lines().map(str::to_string);
        let revision = lines.next().unwrap_or_default();
        let author = lines.next().unwrap_or_default();
        let message = lines.next().unwrap_or_default();
        let branch = String::from_utf8_lossy(&branch.stdout).trim().to_string();

        state.fetch = Some(FetchMetadata {
            branch,
            revision,
            author,
            message,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_url_interpolates_token_into_userinfo() {
        let url = GitFetcher::authenticated_url("https://github.com/acme/widget", Some("tok"));
        assert_eq!(url, "https://tok@github.com/acme/widget");
    }

    #[test]
    fn authenticated_url_passes_through_without_credential() {
        let url = GitFetcher::authenticated_url("https://github.com/acme/widget", None);
        assert_eq!(url, "https://github.com/acme/widget");
    }

    #[test]
    fn classify_failure_detects_repo_not_found() {
        assert_eq!(
            GitFetcher::classify_failure("remote: Repository not found."),
            StageErrorKind::RepoNotFound
        );
    }

    #[test]
    fn classify_failure_detects_auth_denied() {
        assert_eq!(
            GitFetcher::classify_failure("remote: Authentication failed for..."),
            StageErrorKind::AuthDenied
        );
    }

    #[test]
    fn classify_failure_defaults_to_network() {
        assert_eq!(
            GitFetcher::classify_failure("fatal: unable to access: Could not resolve host"),
            StageErrorKind::Network
        );
    }
}
