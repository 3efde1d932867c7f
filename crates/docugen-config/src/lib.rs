//! Environment-driven configuration for the documentation job
//! orchestration engine.
//!
//! `Config` is loaded once per process via [`Config::from_env`],
//! validated, and then handed around as an `Arc<Config>` — there is no
//! global singleton.

pub mod error;

pub use error::{ConfigError, ConfigResult};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The full set of recognized options from the external interfaces
/// table, each with the documented default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,

    /// `workers.count` — size of the worker pool (W).
    pub workers_count: u32,

    /// `job.deadline.hard`.
    pub job_deadline_hard: Duration,
    /// `job.deadline.soft`.
    pub job_deadline_soft: Duration,

    /// S1 Fetch's own timeout (T_fetch), distinct from the job-wide
    /// deadlines — a hung clone must not be allowed to run out the whole
    /// job budget before it's noticed.
    pub fetch_timeout: Duration,

    /// `broker.visibility_timeout` (T_vis).
    pub broker_visibility_timeout: Duration,
    /// `broker.poison_pill_threshold` (N_max).
    pub broker_poison_pill_threshold: u32,

    /// `model.output_token_budget` (T_out).
    pub model_output_token_budget: u32,
    /// `model.retries` (R_model).
    pub model_retries: u32,
    pub model_base_url: String,
    pub model_api_key: Option<String>,
    pub model_name: String,

    /// `scanner.max_depth` (D_max).
    pub scanner_max_depth: u32,
    /// `scanner.max_files` (F_max).
    pub scanner_max_files: u32,
    /// `scanner.ignored_names` — closed set of names to skip.
    pub scanner_ignored_names: Vec<String>,

    /// `analyzer.max_files` (A_max).
    pub analyzer_max_files: u32,

    /// `generator.readme_budget_chars` (N_readme).
    pub generator_readme_budget_chars: u32,

    /// `artifact_store.enabled`.
    pub artifact_store_enabled: bool,
    /// `artifact_store.base_url`.
    pub artifact_store_base_url: Option<String>,
    pub artifact_store_bucket: Option<String>,

    /// GitHub token used for PR creation in the `docs+comments` variant.
    pub github_token: Option<String>,

    /// Root directory for per-job workspaces on local disk.
    pub workspace_root: std::path::PathBuf,

    /// Grace window before a stuck `pending` job is reaped to
    /// `enqueue-timeout`.
    pub reaper_grace_period: Duration,
}

impl Config {
    /// Default ignore list the scanner applies regardless of what the
    /// caller configures, per the Open Question resolving the
    /// scanner's ignore list as a union.
    pub fn default_ignored_names() -> Vec<String> {
        vec![
            "node_modules".to_string(),
            "target".to_string(),
            "vendor".to_string(),
            ".terraform".to_string(),
            "__pycache__".to_string(),
            ".git".to_string(),
        ]
    }

    /// Load configuration from environment variables, applying the
    /// spec's documented defaults where a variable is unset.
    pub fn from_env() -> ConfigResult<Self> {
        let database_url = require_env("DOCUGEN_DATABASE_URL")?;
        let redis_url = require_env("DOCUGEN_REDIS_URL")?;

        let workers_count = parse_env_or("DOCUGEN_WORKERS_COUNT", 2u32)?;

        let job_deadline_hard =
            Duration::from_secs(parse_env_or("DOCUGEN_JOB_DEADLINE_HARD_SECS", 60 * 60u64)?);
        let job_deadline_soft =
            Duration::from_secs(parse_env_or("DOCUGEN_JOB_DEADLINE_SOFT_SECS", 55 * 60u64)?);
        let fetch_timeout =
            Duration::from_secs(parse_env_or("DOCUGEN_FETCH_TIMEOUT_SECS", 5 * 60u64)?);

        let broker_visibility_timeout = Duration::from_secs(parse_env_or(
            "DOCUGEN_BROKER_VISIBILITY_TIMEOUT_SECS",
            60 * 60u64,
        )?);
        let broker_poison_pill_threshold =
            parse_env_or("DOCUGEN_BROKER_POISON_PILL_THRESHOLD", 3u32)?;

        let model_output_token_budget = parse_env_or("DOCUGEN_MODEL_OUTPUT_TOKEN_BUDGET", 8000u32)?;
        let model_retries = parse_env_or("DOCUGEN_MODEL_RETRIES", 2u32)?;
        let model_base_url = std::env::var("DOCUGEN_MODEL_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model_api_key = std::env::var("DOCUGEN_MODEL_API_KEY").ok();
        let model_name =
            std::env::var("DOCUGEN_MODEL_NAME").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let scanner_max_depth = parse_env_or("DOCUGEN_SCANNER_MAX_DEPTH", 10u32)?;
        let scanner_max_files = parse_env_or("DOCUGEN_SCANNER_MAX_FILES", 1000u32)?;
        let scanner_ignored_names = std::env::var("DOCUGEN_SCANNER_IGNORED_NAMES")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(Self::default_ignored_names);

        let analyzer_max_files = parse_env_or("DOCUGEN_ANALYZER_MAX_FILES", 20u32)?;

        let generator_readme_budget_chars =
            parse_env_or("DOCUGEN_GENERATOR_README_BUDGET_CHARS", 3000u32)?;

        let artifact_store_enabled = parse_env_or("DOCUGEN_ARTIFACT_STORE_ENABLED", false)?;
        let artifact_store_base_url = std::env::var("DOCUGEN_ARTIFACT_STORE_BASE_URL").ok();
        let artifact_store_bucket = std::env::var("DOCUGEN_ARTIFACT_STORE_BUCKET").ok();

        let github_token = std::env::var("DOCUGEN_GITHUB_TOKEN").ok();

        let workspace_root = std::env::var("DOCUGEN_WORKSPACE_ROOT")
            .unwrap_or_else(|_| "/tmp/docugen".to_string())
            .into();

        let reaper_grace_period =
            Duration::from_secs(parse_env_or("DOCUGEN_REAPER_GRACE_PERIOD_SECS", 15 * 60u64)?);

        let config = Config {
            database_url,
            redis_url,
            workers_count,
            job_deadline_hard,
            job_deadline_soft,
            fetch_timeout,
            broker_visibility_timeout,
            broker_poison_pill_threshold,
            model_output_token_budget,
            model_retries,
            model_base_url,
            model_api_key,
            model_name,
            scanner_max_depth,
            scanner_max_files,
            scanner_ignored_names,
            analyzer_max_files,
            generator_readme_budget_chars,
            artifact_store_enabled,
            artifact_store_base_url,
            artifact_store_bucket,
            github_token,
            workspace_root,
            reaper_grace_period,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.workers_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers.count".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.job_deadline_soft >= self.job_deadline_hard {
            return Err(ConfigError::InvalidValue {
                field: "job.deadline.soft".to_string(),
                message: "must be strictly less than job.deadline.hard".to_string(),
            });
        }
        if self.scanner_ignored_names.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "scanner.ignored_names".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.broker_poison_pill_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "broker.poison_pill_threshold".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn require_env(key: &str) -> ConfigResult<String> {
    std::env::var(key).map_err(|_| ConfigError::MissingField(key.to_string()))
}

fn parse_env_or<T>(key: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            field: key.to_string(),
            message: format!("could not parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ignored_names_is_non_empty() {
        assert!(!Config::default_ignored_names().is_empty());
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut cfg = sample_config();
        cfg.workers_count = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_soft_deadline_past_hard() {
        let mut cfg = sample_config();
        cfg.job_deadline_soft = Duration::from_secs(120);
        cfg.job_deadline_hard = Duration::from_secs(60);
        assert!(cfg.validate().is_err());
    }

    fn sample_config() -> Config {
        Config {
            database_url: "postgres://localhost/docugen".to_string(),
            redis_url: "redis://localhost".to_string(),
            workers_count: 2,
            job_deadline_hard: Duration::from_secs(3600),
            job_deadline_soft: Duration::from_secs(3300),
            fetch_timeout: Duration::from_secs(300),
            broker_visibility_timeout: Duration::from_secs(3600),
            broker_poison_pill_threshold: 3,
            model_output_token_budget: 8000,
            model_retries: 2,
            model_base_url: "https://api.openai.com/v1".to_string(),
            model_api_key: None,
            model_name: "gpt-4o-mini".to_string(),
            scanner_max_depth: 10,
            scanner_max_files: 1000,
            scanner_ignored_names: Config::default_ignored_names(),
            analyzer_max_files: 20,
            generator_readme_budget_chars: 3000,
            artifact_store_enabled: false,
            artifact_store_base_url: None,
            artifact_store_bucket: None,
            github_token: None,
            workspace_root: "/tmp/docugen".into(),
            reaper_grace_period: Duration::from_secs(900),
        }
    }
}
