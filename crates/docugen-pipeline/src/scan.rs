//! S2 Scan — recursively enumerate the workspace, classify, and cap.
//!
//! Generalizes `GitService::scan_directory`'s recursive async walk and
//! ignore list into spec.md's general classification scan. Unlike the
//! teacher's depth-first recursion, this walk is breadth-first with an
//! alphabetical tie-break, so truncation at `F_max`/`D_max` is
//! deterministic per spec.md's boundary-behavior requirement.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use docugen_core::{FileClass, RunState, ScanResult, ScannedFile, StageErrorKind, TreeScanner};

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "c", "h", "cpp", "cc", "hpp", "rb", "php",
    "cs", "kt", "kts", "swift", "scala", "sh", "bash", "zig", "ex", "exs", "erl", "hs", "lua",
    "pl", "r", "dart", "m", "mm",
];
const DOCS_EXTENSIONS: &[&str] = &["md", "mdx", "rst", "txt", "adoc", "asciidoc"];
const CONFIG_EXTENSIONS: &[&str] = &[
    "json", "yaml", "yml", "toml", "ini", "cfg", "conf", "env", "xml",
];
const CONFIG_NAMES: &[&str] = &[
    "Dockerfile",
    "Makefile",
    "Cargo.lock",
    "package-lock.json",
    ".gitignore",
    ".dockerignore",
];

fn classify(path: &Path) -> FileClass {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if CONFIG_NAMES.contains(&name.as_str()) {
        return FileClass::Config;
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if CODE_EXTENSIONS.contains(&ext.as_str()) {
        FileClass::Code
    } else if DOCS_EXTENSIONS.contains(&ext.as_str()) {
        FileClass::Docs
    } else if CONFIG_EXTENSIONS.contains(&ext.as_str()) {
        FileClass::Config
    } else {
        FileClass::Other
    }
}

/// Breadth-first workspace walker bounded by `max_depth`/`max_files` and
/// a closed set of ignored directory/file names.
pub struct WalkScanner {
    max_depth: u32,
    max_files: u32,
    ignored_names: Vec<String>,
}

impl WalkScanner {
    pub fn new(max_depth: u32, max_files: u32, ignored_names: Vec<String>) -> Self {
        Self {
            max_depth,
            max_files,
            ignored_names,
        }
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignored_names.iter().any(|i| i == name)
    }
}

#[async_trait]
impl TreeScanner for WalkScanner {
    async fn scan(&self, state: &mut RunState) -> Result<(), StageErrorKind> {
        let root = state.workspace.clone();
        let mut files = Vec::new();
        let mut total_dirs = 0usize;
        let mut truncated = false;

        let mut queue: VecDeque<(PathBuf, u32)> = VecDeque::new();
        queue.push_back((root.clone(), 0));

        'walk: while let Some((dir, depth)) = queue.pop_front() {
            if depth > self.max_depth {
                truncated = true;
                continue;
            }

            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|_| StageErrorKind::IoError)?;
            let mut children = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|_| StageErrorKind::IoError)?
            {
                children.push(entry.path());
            }
            children.sort();

            for path in children {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if self.is_ignored(&name) {
                    continue;
                }

                let metadata = match tokio::fs::metadata(&path).await {
                    Ok(m) => m,
                    Err(_) => continue,
                };

                if metadata.is_dir() {
                    total_dirs += 1;
                    if depth + 1 > self.max_depth {
                        truncated = true;
                        continue;
                    }
                    queue.push_back((path, depth + 1));
                } else if metadata.is_file() {
                    if files.len() as u32 >= self.max_files {
                        truncated = true;
                        break 'walk;
                    }
                    let relative = path.strip_prefix(&root).unwrap_or(&path).to_path_buf();
                    files.push(ScannedFile {
                        path: relative,
                        size_bytes: metadata.len(),
                        class: classify(&path),
                    });
                }
            }
        }

        // If anything was still queued when we stopped, the tree was
        // larger than F_max/D_max allowed us to enumerate.
        if !queue.is_empty() {
            truncated = true;
        }

        let total_files = files.len();
        state.scan = Some(ScanResult {
            files,
            total_files,
            total_dirs,
            scan_truncated: truncated,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docugen_core::{JobVariant, ResourceId};
    use std::io::Write;

    fn run_state_for(dir: &std::path::Path) -> RunState {
        RunState::new(
            ResourceId::new(),
            "https://example.com/a/b".to_string(),
            None,
            JobVariant::Docs,
            false,
            dir.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn classifies_and_caps_file_count() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            let mut f = std::fs::File::create(dir.path().join(format!("mod_{i}.rs"))).unwrap();
            writeln!(f, "fn main() {{}}").unwrap();
        }
        std::fs::write(dir.path().join("README.md"), "# hi").unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/ignored.js"), "x").unwrap();

        let scanner = WalkScanner::new(10, 1000, vec!["node_modules".to_string()]);
        let mut state = run_state_for(dir.path());
        scanner.scan(&mut state).await.unwrap();

        let scan = state.scan.unwrap();
        assert_eq!(scan.total_files, 6);
        assert!(!scan.scan_truncated);
        assert!(scan
            .files
            .iter()
            .any(|f| f.path == PathBuf::from("README.md") && f.class == FileClass::Docs));
    }

    #[tokio::test]
    async fn truncates_deterministically_at_f_max() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("f_{i}.py")), "x").unwrap();
        }
        let scanner = WalkScanner::new(10, 3, vec![]);
        let mut state = run_state_for(dir.path());
        scanner.scan(&mut state).await.unwrap();

        let scan = state.scan.unwrap();
        assert_eq!(scan.total_files, 3);
        assert!(scan.scan_truncated);
        // Alphabetical tie-break: f_0, f_1, f_2 kept.
        assert!(scan.files.iter().any(|f| f.path == PathBuf::from("f_0.py")));
        assert!(scan.files.iter().any(|f| f.path == PathBuf::from("f_2.py")));
        assert!(!scan.files.iter().any(|f| f.path == PathBuf::from("f_4.py")));
    }
}
