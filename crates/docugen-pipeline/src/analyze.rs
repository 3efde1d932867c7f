//! S3 Analyze — per-language extractor registry.
//!
//! Implements the Design Note "Dynamic per-file dispatch": a registry
//! keyed by file extension returning a common `FileAnalysis` shape. An
//! indent-delimited AST extractor handles Python; a brace-delimited
//! pattern extractor (regex-based, consistent with the teacher's
//! dependency set) handles Rust/JS/TS/Java/Go/C-family and is the
//! fallback for every other extension, per spec.md's "tolerant parser...
//! additional languages degrade to the pattern-based extractor".

use std::path::PathBuf;

use async_trait::async_trait;
use docugen_core::{CodeAnalyzer, FileAnalysis, FileClass, RunState, StageErrorKind};
use regex::Regex;

/// Selects and analyzes up to `max_files` code files, per spec.md's
/// explicit priority: root-level first, then larger files, ties broken
/// alphabetically.
pub struct ExtractorRegistry {
    max_files: u32,
}

impl ExtractorRegistry {
    pub fn new(max_files: u32) -> Self {
        Self { max_files }
    }

    fn select<'a>(
        &self,
        files: &'a [docugen_core::ScannedFile],
    ) -> Vec<&'a docugen_core::ScannedFile> {
        let mut candidates: Vec<&docugen_core::ScannedFile> = files
            .iter()
            .filter(|f| f.class == FileClass::Code)
            .collect();

        candidates.sort_by(|a, b| {
            let a_root = a.path.components().count() == 1;
            let b_root = b.path.components().count() == 1;
            b_root
                .cmp(&a_root)
                .then(b.size_bytes.cmp(&a.size_bytes))
                .then(a.path.cmp(&b.path))
        });

        candidates.truncate(self.max_files as usize);
        candidates
    }

    fn extract(path: &PathBuf, content: &str) -> FileAnalysis {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if ext == "py" {
            extract_python(path, content)
        } else {
            extract_pattern(path, content, &ext)
        }
    }
}

#[async_trait]
impl CodeAnalyzer for ExtractorRegistry {
    async fn analyze(&self, state: &mut RunState) -> Result<(), StageErrorKind> {
        let Some(scan) = &state.scan else {
            return Err(StageErrorKind::NoAnalyzableFiles);
        };

        let selected: Vec<PathBuf> = self
            .select(&scan.files)
            .into_iter()
            .map(|f| f.path.clone())
            .collect();

        if selected.is_empty() {
            return Err(StageErrorKind::NoAnalyzableFiles);
        }

        let mut analyses = Vec::new();
        for relative in selected {
            let full_path = state.workspace.join(&relative);
            match tokio::fs::read_to_string(&full_path).await {
                Ok(content) => analyses.push(Self::extract(&relative, &content)),
                Err(_) => analyses.push(FileAnalysis {
                    path: relative,
                    language: "unknown".to_string(),
                    symbols: Vec::new(),
                    summary: "error: could not read file".to_string(),
                }),
            }
        }

        state.analysis = analyses;
        Ok(())
    }
}

/// Indent-delimited AST extractor for Python: a hand-rolled, tolerant
/// line scanner rather than a full grammar, matching spec.md's "tolerant
/// parser" requirement.
fn extract_python(path: &PathBuf, content: &str) -> FileAnalysis {
    let mut symbols = Vec::new();
    let mut imports = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("def ") {
            if let Some(name) = rest.split(['(', ':']).next() {
                symbols.push(format!("fn {}", name.trim()));
            }
        } else if let Some(rest) = trimmed.strip_prefix("class ") {
            if let Some(name) = rest.split(['(', ':']).next() {
                symbols.push(format!("class {}", name.trim()));
            }
        } else if trimmed.starts_with("import ") || trimmed.starts_with("from ") {
            imports.push(trimmed.to_string());
        }
    }

    let docstring = content
        .lines()
        .skip_while(|l| l.trim().is_empty())
        .find(|l| l.trim_start().starts_with("\"\"\"") || l.trim_start().starts_with("'''"))
        .map(|l| l.trim().to_string());

    let mut summary = format!("{} symbol(s), {} import(s)", symbols.len(), imports.len());
    if let Some(doc) = docstring {
        summary.push_str(&format!("; docstring: {doc}"));
    }

    FileAnalysis {
        path: path.clone(),
        language: "python".to_string(),
        symbols,
        summary,
    }
}

/// Brace-delimited pattern extractor: a regex scanner matching common
/// declaration keywords across Rust/JS/TS/Java/Go/C-family, used as the
/// fallback for any extension with no dedicated extractor.
fn extract_pattern(path: &PathBuf, content: &str, ext: &str) -> FileAnalysis {
    let decl = Regex::new(r"(?m)^\s*(?:pub\s+|export\s+|public\s+|static\s+)*(fn|function|class|struct|interface|func|def)\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("static regex is valid");
    let import_re = Regex::new(r"(?m)^\s*(use|import|require|#include)\s+.+$")
        .expect("static regex is valid");

    let symbols: Vec<String> = decl
        .captures_iter(content)
        .map(|c| format!("{} {}", &c[1], &c[2]))
        .collect();
    let import_count = import_re.find_iter(content).count();

    let language = match ext {
        "rs" => "rust",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "go" => "go",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "" => "unknown",
        other => other,
    }
    .to_string();

    FileAnalysis {
        path: path.clone(),
        language,
        summary: format!("{} symbol(s), {} import(s)", symbols.len(), import_count),
        symbols,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docugen_core::ScannedFile;

    #[test]
    fn python_extractor_finds_defs_classes_and_docstring() {
        let src = "\"\"\"Module doc.\"\"\"\nimport os\n\nclass Foo:\n    def bar(self):\n        pass\n";
        let analysis = extract_python(&PathBuf::from("m.py"), src);
        assert_eq!(analysis.language, "python");
        assert!(analysis.symbols.contains(&"class Foo".to_string()));
        assert!(analysis.symbols.contains(&"fn bar".to_string()));
        assert!(analysis.summary.contains("docstring"));
    }

    #[test]
    fn pattern_extractor_finds_rust_fn_and_use() {
        let src = "use std::fmt;\n\npub fn greet() {}\n\nstruct Widget;\n";
        let analysis = extract_pattern(&PathBuf::from("lib.rs"), src, "rs");
        assert_eq!(analysis.language, "rust");
        assert!(analysis.symbols.iter().any(|s| s.contains("greet")));
        assert!(analysis.symbols.iter().any(|s| s.contains("Widget")));
    }

    #[test]
    fn select_prioritizes_root_then_size_then_alphabetical() {
        let files = vec![
            ScannedFile {
                path: PathBuf::from("src/small.rs"),
                size_bytes: 10,
                class: FileClass::Code,
            },
            ScannedFile {
                path: PathBuf::from("main.rs"),
                size_bytes: 5,
                class: FileClass::Code,
            },
            ScannedFile {
                path: PathBuf::from("src/big.rs"),
                size_bytes: 100,
                class: FileClass::Code,
            },
        ];
        let registry = ExtractorRegistry::new(10);
        let selected = registry.select(&files);
        assert_eq!(selected[0].path, PathBuf::from("main.rs"));
        assert_eq!(selected[1].path, PathBuf::from("src/big.rs"));
        assert_eq!(selected[2].path, PathBuf::from("src/small.rs"));
    }
}
