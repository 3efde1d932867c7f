//! S4 Generate — build the prompt, call the language model, retry.
//!
//! `HttpModelClient` is grounded on
//! `buildit_api::services::github::GitHubClient`'s shape: a
//! `reqwest::Client` plus bearer token, one `async fn` per remote
//! operation, a dedicated `thiserror` error enum distinguishing
//! request/parse/API failure. The retry policy (Design Note "Retry &
//! backoff for the language model") lives here, not in the Worker
//! Runtime: up to `retries` attempts on transient errors, exponential
//! backoff with full jitter.

use std::time::Duration;

use async_trait::async_trait;
use docugen_core::{DocGenerator, RunState, StageErrorKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// An OpenAI-compatible chat completion response relevant to us.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("rate limited")]
    RateLimited,

    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("model rejected the request: {0}")]
    Rejected(String),

    #[error("response contained no usable content")]
    EmptyOutput,

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl From<&ModelError> for StageErrorKind {
    fn from(err: &ModelError) -> Self {
        match err {
            ModelError::RateLimited => StageErrorKind::ModelRateLimited,
            ModelError::Unavailable(_) | ModelError::Request(_) => StageErrorKind::ModelUnavailable,
            ModelError::Rejected(_) => StageErrorKind::ModelRejected,
            ModelError::EmptyOutput | ModelError::Parse(_) => StageErrorKind::EmptyOutput,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// A thin client over an OpenAI-compatible chat completions endpoint.
pub struct HttpModelClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model_name: String,
}

impl HttpModelClient {
    pub fn new(base_url: String, api_key: Option<String>, model_name: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model_name,
        }
    }

    pub async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model_name,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
        };

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ModelError::RateLimited);
        }
        if status.as_u16() >= 500 {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::Unavailable(text));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::Rejected(text));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ModelError::EmptyOutput);
        }

        let usage = completion.usage.unwrap_or(ChatUsage {
            prompt_tokens: 0,
            completion_tokens: 0,
        });

        Ok(ModelResponse {
            text,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}

/// The `DocGenerator` Stage Tool: builds the prompt and drives the
/// retry/backoff policy around `HttpModelClient::generate`.
pub struct Generator {
    client: HttpModelClient,
    output_token_budget: u32,
    retries: u32,
    readme_budget_chars: usize,
}

impl Generator {
    pub fn new(
        client: HttpModelClient,
        output_token_budget: u32,
        retries: u32,
        readme_budget_chars: usize,
    ) -> Self {
        Self {
            client,
            output_token_budget,
            retries,
            readme_budget_chars,
        }
    }

    /// Assemble the structured prompt: repo name, aggregate stats, a
    /// depth-limited tree rendering, the analysis summary, and the first
    /// `N_readme` README characters.
    pub async fn build_prompt(&self, state: &RunState) -> String {
        let repo_name = state
            .source
            .rsplit('/')
            .next()
            .unwrap_or(&state.source)
            .to_string();

        let mut prompt = format!("# Documentation request for {repo_name}\n\n");

        if let Some(scan) = &state.scan {
            prompt.push_str(&format!(
                "## Repository stats\n- files: {}\n- directories: {}\n\n",
                scan.total_files, scan.total_dirs
            ));
            prompt.push_str("## File tree (partial)\n");
            for file in scan.files.iter().take(200) {
                prompt.push_str(&format!("- {}\n", file.path.display()));
            }
            prompt.push('\n');
        }

        if !state.analysis.is_empty() {
            prompt.push_str("## Code analysis\n");
            for analysis in &state.analysis {
                prompt.push_str(&format!(
                    "### {}\nlanguage: {}\n{}\nsymbols: {}\n\n",
                    analysis.path.display(),
                    analysis.language,
                    analysis.summary,
                    analysis.symbols.join(", ")
                ));
            }
        }

        let readme_path = state.workspace.join("README.md");
        if let Ok(readme) = tokio::fs::read_to_string(&readme_path).await {
            let truncated: String = readme.chars().take(self.readme_budget_chars).collect();
            prompt.push_str(&format!("## README (excerpt)\n{truncated}\n"));
        }

        prompt
    }

    async fn backoff_sleep(attempt: u32) {
        let base_ms = 200u64 * 2u64.pow(attempt);
        let jitter_ms = rand::thread_rng().gen_range(0..=base_ms);
        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
    }
}

#[async_trait]
impl DocGenerator for Generator {
    async fn generate(&self, state: &mut RunState) -> Result<(), StageErrorKind> {
        if state.analysis.is_empty() && state.scan.is_none() {
            return Err(StageErrorKind::NoAnalyzableFiles);
        }

        let prompt = self.build_prompt(state).await;

        let mut attempt = 0u32;
        loop {
            info!(job_id = %state.job_id, attempt, "calling language model");
            match self.client.generate(&prompt, self.output_token_budget).await {
                Ok(response) => {
                    state.generated = Some(response.text);
                    state.model_prompt_tokens = Some(response.prompt_tokens);
                    state.model_completion_tokens = Some(response.completion_tokens);
                    return Ok(());
                }
                Err(err @ (ModelError::RateLimited | ModelError::Unavailable(_) | ModelError::Request(_)))
                    if attempt < self.retries =>
                {
                    warn!(job_id = %state.job_id, error = %err, attempt, "transient model error, retrying");
                    Self::backoff_sleep(attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err((&err).into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docugen_core::{JobVariant, ResourceId, ScanResult};

    #[tokio::test]
    async fn build_prompt_includes_repo_name_and_stats() {
        let mut state = RunState::new(
            ResourceId::new(),
            "https://example.com/acme/widget".to_string(),
            None,
            JobVariant::Docs,
            false,
            std::env::temp_dir(),
        );
        state.scan = Some(ScanResult {
            files: vec![],
            total_files: 3,
            total_dirs: 1,
            scan_truncated: false,
        });

        let generator = Generator::new(
            HttpModelClient::new("http://localhost".to_string(), None, "test-model".to_string()),
            8000,
            2,
            3000,
        );
        let prompt = generator.build_prompt(&state).await;
        assert!(prompt.contains("widget"));
        assert!(prompt.contains("files: 3"));
    }

    #[test]
    fn model_error_maps_to_stage_error_kind() {
        assert_eq!(
            StageErrorKind::from(&ModelError::RateLimited),
            StageErrorKind::ModelRateLimited
        );
        assert_eq!(
            StageErrorKind::from(&ModelError::Rejected("no".to_string())),
            StageErrorKind::ModelRejected
        );
        assert_eq!(
            StageErrorKind::from(&ModelError::EmptyOutput),
            StageErrorKind::EmptyOutput
        );
    }
}
