//! `RunState` — the value threaded through the Pipeline's stages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{JobVariant, ResourceId, StageErrorKind};

/// Which stage a `RunState` is currently in or last attempted. Used for
/// logging and for the Worker Runtime's timeout bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageName {
    Fetch,
    Scan,
    Analyze,
    Generate,
    Publish,
    Cleanup,
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageName::Fetch => "fetch",
            StageName::Scan => "scan",
            StageName::Analyze => "analyze",
            StageName::Generate => "generate",
            StageName::Publish => "publish",
            StageName::Cleanup => "cleanup",
        };
        f.write_str(s)
    }
}

/// Metadata about the fetched HEAD, collected during Fetch (S1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchMetadata {
    pub branch: String,
    pub revision: String,
    pub author: String,
    pub message: String,
}

/// Coarse classification assigned to a scanned path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileClass {
    Code,
    Docs,
    Config,
    Other,
}

/// A single file discovered during Scan (S2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub class: FileClass,
}

/// Aggregate output of the Scan stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    pub files: Vec<ScannedFile>,
    pub total_files: usize,
    pub total_dirs: usize,
    /// Set when `F_max`/`D_max` were hit and the walk stopped early.
    pub scan_truncated: bool,
}

/// Per-file output of the Analyze stage (S3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub language: String,
    pub symbols: Vec<String>,
    pub summary: String,
}

/// The value every Pipeline stage reads from and writes into. Built
/// incrementally: only `job_id`, `source`, `credential`, `variant`, and
/// `workspace` are guaranteed present before Fetch runs; every later
/// field is populated by the stage that owns it.
#[derive(Debug, Clone)]
pub struct RunState {
    pub job_id: ResourceId,
    pub source: String,
    pub credential: Option<String>,
    pub variant: JobVariant,
    pub has_write_access: bool,
    pub workspace: PathBuf,

    pub fetch: Option<FetchMetadata>,
    pub scan: Option<ScanResult>,
    pub analysis: Vec<FileAnalysis>,
    pub generated: Option<String>,
    /// The model's reported input/output token counts for the Generate
    /// call that produced `generated`, kept for observability (spec.md
    /// S4 and end-to-end scenario 4).
    pub model_prompt_tokens: Option<u32>,
    pub model_completion_tokens: Option<u32>,
    pub artifact_url: Option<String>,
    pub pull_request_url: Option<String>,

    pub current_stage: StageName,
    pub terminal_error: Option<StageErrorKind>,
}

impl RunState {
    pub fn new(
        job_id: ResourceId,
        source: String,
        credential: Option<String>,
        variant: JobVariant,
        has_write_access: bool,
        workspace: PathBuf,
    ) -> Self {
        Self {
            job_id,
            source,
            credential,
            variant,
            has_write_access,
            workspace,
            fetch: None,
            scan: None,
            analysis: Vec::new(),
            generated: None,
            model_prompt_tokens: None,
            model_completion_tokens: None,
            artifact_url: None,
            pull_request_url: None,
            current_stage: StageName::Fetch,
            terminal_error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.terminal_error.is_none()
    }
}
