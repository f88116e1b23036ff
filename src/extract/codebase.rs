// promptforge — Codebase indexing into components
//
// Files are grouped by directory; import statements link the groups.
// A judgment service, when given, may propose its own grouping instead.

use crate::artifact::{Component, ComponentIndex};
use crate::error::ExtractError;
use crate::judge::{with_timeout, JudgeRequest, JudgmentService};
use ignore::WalkBuilder;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Directory names never indexed.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git", "__pycache__", "node_modules", "venv", ".venv", "env", "target", "dist", "build",
    ".terraform", ".project-resources",
];

/// Files larger than this are listed but not scanned for imports.
const MAX_SCAN_BYTES: u64 = 512 * 1024;
/// Files shown to the judge, and characters shown per file.
const JUDGE_FILE_LIMIT: usize = 20;
const JUDGE_EXCERPT_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "You are a codebase analyzer. Analyze files and group them into logical \
components. Return a JSON object with a \"components\" array; each component has name, description, \
file_paths, dependencies and responsibilities.";

/// Language name by file extension, `"unknown"` otherwise.
pub fn detect_language(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "py" => "python",
        "js" | "jsx" | "mjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "go" => "go",
        "rs" => "rust",
        "cpp" | "cc" | "hpp" => "cpp",
        "c" | "h" => "c",
        "rb" => "ruby",
        "php" => "php",
        _ => "unknown",
    }
}

/// Walk `paths` (files or directories, relative ones resolved against
/// `project_root`) and return source files in sorted order. Hidden entries,
/// gitignored entries and `EXCLUDED_DIRS` are skipped.
pub fn collect_files(paths: &[PathBuf], project_root: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut files = BTreeSet::new();
    for path in paths {
        let path = if path.is_absolute() {
            path.clone()
        } else {
            project_root.join(path)
        };
        if path.is_file() {
            files.insert(path);
            continue;
        }
        if !path.is_dir() {
            return Err(ExtractError::NotFound(path.display().to_string()));
        }

        let mut builder = WalkBuilder::new(&path);
        builder.hidden(true).git_ignore(true).git_exclude(true);
        builder.filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !EXCLUDED_DIRS.iter().any(|d| *d == name)
        });
        for result in builder.build() {
            match result {
                Ok(entry) if entry.file_type().is_some_and(|t| t.is_file()) => {
                    if detect_language(entry.path()) != "unknown" {
                        files.insert(entry.into_path());
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to read directory entry"),
            }
        }
    }
    tracing::debug!(files = files.len(), "Source files collected");
    Ok(files.into_iter().collect())
}

fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?m)^\s*(?:from\s+([\w.]+)\s+import|import\s+([\w.]+)|(?:pub\s+)?(?:use|mod)\s+([\w:]+)|import\s+.*?from\s+['"]([^'"]+)['"]|import\s+"([^"]+)")"#,
        )
        .unwrap_or_else(|e| panic!("invalid import regex: {e}"))
    })
}

fn require_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#)
            .unwrap_or_else(|e| panic!("invalid require regex: {e}"))
    })
}

/// Module paths named by import statements (Python, Rust, JS/TS, Go).
pub fn extract_imports(source: &str) -> Vec<String> {
    let mut imports: Vec<String> = import_re()
        .captures_iter(source)
        .filter_map(|caps| (1..=5).find_map(|i| caps.get(i)).map(|m| m.as_str().to_string()))
        .collect();
    imports.extend(require_re().captures_iter(source).map(|c| c[1].to_string()));
    imports
}

/// Split an import path into the names it mentions.
fn import_segments(import: &str) -> impl Iterator<Item = &str> {
    import
        .split(['.', '/', ':'])
        .filter(|s| !s.is_empty() && *s != "crate" && *s != "super" && *s != "self")
}

/// Group files by their parent directory, one component per directory.
///
/// Component names are the directory relative to `project_root` (`"root"`
/// for files at the top). A component depends on another when one of its
/// files imports a module whose path mentions the other's directory name.
pub fn group_by_directory(files: &[PathBuf], project_root: &Path) -> Vec<Component> {
    let mut groups: BTreeMap<String, Vec<&PathBuf>> = BTreeMap::new();
    for file in files {
        let dir = file.parent().map(|p| relative(p, project_root)).unwrap_or_default();
        let name = if dir.is_empty() { "root".to_string() } else { dir };
        groups.entry(name).or_default().push(file);
    }

    // last directory segment -> component names
    let mut by_leaf: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for name in groups.keys() {
        let leaf = name.rsplit('/').next().unwrap_or(name).to_string();
        by_leaf.entry(leaf).or_default().push(name.clone());
    }

    groups
        .iter()
        .map(|(name, members)| {
            let mut languages = BTreeSet::new();
            let mut dependencies = BTreeSet::new();
            for file in members {
                languages.insert(detect_language(file));
                let scannable = std::fs::metadata(file).map(|m| m.len() <= MAX_SCAN_BYTES).unwrap_or(false);
                let Some(source) = scannable.then(|| std::fs::read_to_string(file).ok()).flatten() else {
                    continue;
                };
                for import in extract_imports(&source) {
                    for segment in import_segments(&import) {
                        if let Some(targets) = by_leaf.get(segment) {
                            dependencies.extend(targets.iter().filter(|t| *t != name).cloned());
                        }
                    }
                }
            }
            let languages: Vec<_> = languages.into_iter().filter(|l| *l != "unknown").collect();
            let description = if languages.is_empty() {
                format!("Component in {} directory", name)
            } else {
                format!("Component in {} directory ({})", name, languages.join(", "))
            };
            Component {
                name: name.clone(),
                description,
                file_paths: members.iter().map(|f| relative(f, project_root)).collect(),
                responsibilities: Vec::new(),
                dependencies: dependencies.into_iter().collect(),
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct JudgedComponents {
    components: Vec<Component>,
}

/// Builds a `ComponentIndex` for a project tree.
pub struct CodebaseIndexer {
    project_root: PathBuf,
    judge: Option<Arc<dyn JudgmentService>>,
    timeout: Duration,
}

impl CodebaseIndexer {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            judge: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Let a judgment service propose the grouping. Directory grouping is
    /// still used when its reply is unusable.
    pub fn with_judge(mut self, judge: Arc<dyn JudgmentService>, timeout: Duration) -> Self {
        self.judge = Some(judge);
        self.timeout = timeout;
        self
    }

    pub async fn index(&self, paths: &[PathBuf]) -> Result<ComponentIndex, ExtractError> {
        let root = self.project_root.clone();
        let owned = paths.to_vec();
        let (files, grouped) = tokio::task::spawn_blocking(move || {
            let files = collect_files(&owned, &root)?;
            let grouped = group_by_directory(&files, &root);
            Ok::<_, ExtractError>((files, grouped))
        })
        .await
        .map_err(|e| ExtractError::Io(std::io::Error::other(e)))??;

        let components = match &self.judge {
            Some(judge) if !files.is_empty() => match self.judge_grouping(judge.as_ref(), &files).await {
                Ok(components) => components,
                Err(reason) => {
                    tracing::warn!(reason = %reason, "Judged grouping rejected, using directory grouping");
                    grouped
                }
            },
            _ => grouped,
        };

        tracing::info!(files = files.len(), components = components.len(), "Codebase indexed");
        Ok(ComponentIndex {
            components,
            indexed_at: Some(chrono::Utc::now().to_rfc3339()),
            project_root: Some(self.project_root.display().to_string()),
        })
    }

    async fn judge_grouping(
        &self,
        judge: &dyn JudgmentService,
        files: &[PathBuf],
    ) -> Result<Vec<Component>, String> {
        let mut listing = String::new();
        for file in files.iter().take(JUDGE_FILE_LIMIT) {
            let excerpt: String = tokio::fs::read_to_string(file)
                .await
                .unwrap_or_default()
                .chars()
                .take(JUDGE_EXCERPT_CHARS)
                .collect();
            listing.push_str(&format!("File: {}\n{}\n\n", relative(file, &self.project_root), excerpt));
        }
        if files.len() > JUDGE_FILE_LIMIT {
            listing.push_str(&format!("... and {} more files\n", files.len() - JUDGE_FILE_LIMIT));
        }
        let prompt = format!(
            "Analyze the following codebase files and group them into logical components.\n\n\
             For each component provide name, description, file_paths, dependencies (other \
             component names) and responsibilities.\n\nFiles to analyze:\n{}",
            listing
        );
        let schema = json!({
            "type": "object",
            "required": ["components"],
            "properties": { "components": { "type": "array" } }
        });
        let request = JudgeRequest::new(SYSTEM_PROMPT, prompt).with_temperature(0.3);
        let reply: Value = with_timeout(self.timeout, judge.structured_complete(&request, &schema))
            .await
            .map_err(|e| e.to_string())?;

        let judged: JudgedComponents =
            serde_json::from_value(reply).map_err(|e| format!("reply does not list components: {}", e))?;
        if judged.components.is_empty() {
            return Err("reply lists no components".into());
        }
        if let Some(c) = judged.components.iter().find(|c| c.name.trim().is_empty()) {
            return Err(format!("component without a name ({} files)", c.file_paths.len()));
        }
        Ok(judged.components)
    }
}
