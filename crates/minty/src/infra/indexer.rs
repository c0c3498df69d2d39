//! Codebase indexer: a JSON manifest plus one Markdown dump of every text
//! file under a directory, for pasting into an LLM context.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;
use walkdir::DirEntry;
use walkdir::WalkDir;

use crate::common::error_codes::{self, ErrorCategory};

pub const MANIFEST_FILE: &str = ".minty";
pub const MARKDOWN_FILE: &str = "codebase.md";
pub const MANIFEST_VERSION: &str = "1.1.0";
pub const MAX_FILE_BYTES: u64 = 1024 * 1024;
const BINARY_SNIFF_BYTES: usize = 4096;

const SKIPPED_DIRS: &[&str] = &["node_modules", "dist", ".git"];
const SKIPPED_FILES: &[&str] = &[MANIFEST_FILE, MARKDOWN_FILE, "package-lock.json", "yarn.lock"];

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Directory not found: {0}")]
    NotFound(PathBuf),
    #[error("Target path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to encode manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IndexError {
    pub fn code(&self) -> i32 {
        match self {
            IndexError::NotFound(_) | IndexError::NotADirectory(_) => error_codes::DIRECTORY_ERROR,
            _ => error_codes::INDEX_ERROR,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedFile {
    pub path: String,
    pub size: u64,
    pub tokens: u64,
    pub last_modified: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub last_scanned: String,
    pub project_id: String,
    pub total_files: usize,
    pub total_tokens: u64,
    pub files: Vec<IndexedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooLarge,
    Binary,
    Unreadable(String),
}

#[derive(Debug, Clone)]
pub struct IndexReport {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub markdown_path: PathBuf,
    pub project_id: String,
    pub total_files: usize,
    pub total_tokens: u64,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(content: &str) -> u64 {
    (content.chars().count() as u64).div_ceil(4)
}

pub fn index_directory(dir: &Path) -> Result<IndexReport, IndexError> {
    let root = match fs::canonicalize(dir) {
        Ok(root) => root,
        Err(_) => return Err(IndexError::NotFound(dir.to_path_buf())),
    };
    if !root.is_dir() {
        return Err(IndexError::NotADirectory(root));
    }

    let manifest_path = root.join(MANIFEST_FILE);
    let markdown_path = root.join(MARKDOWN_FILE);
    let project_id = existing_project_id(&manifest_path).unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut files = Vec::new();
    let mut skipped = Vec::new();
    let mut markdown = String::from("# Codebase Dump\n\n");

    for entry in WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && !is_skipped_file(entry))
    {
        let rel = relative_path(&root, entry.path());
        match read_indexable(entry.path()) {
            Ok((content, size, modified)) => {
                let tokens = estimate_tokens(&content);
                markdown.push_str(&format!("## File: {}\n```\n{}\n```\n\n", rel, content));
                files.push(IndexedFile {
                    path: rel,
                    size,
                    tokens,
                    last_modified: modified,
                    content,
                });
            }
            Err(reason) => {
                debug!(path = %rel, reason = ?reason, "Skipping file");
                skipped.push((rel, reason));
            }
        }
    }

    let total_tokens = files.iter().map(|f| f.tokens).sum();
    let manifest = Manifest {
        version: MANIFEST_VERSION.to_string(),
        last_scanned: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        project_id: project_id.clone(),
        total_files: files.len(),
        total_tokens,
        files,
    };

    let json = serde_json::to_string_pretty(&manifest)?;
    write_file(&manifest_path, json.as_bytes())?;
    write_file(&markdown_path, markdown.as_bytes())?;

    Ok(IndexReport {
        root,
        manifest_path,
        markdown_path,
        project_id,
        total_files: manifest.total_files,
        total_tokens,
        skipped,
    })
}

/// Contents of a previously written Markdown dump.
pub fn read_context(dir: &Path) -> Option<String> {
    fs::read_to_string(dir.join(MARKDOWN_FILE)).ok()
}

/// Runs `<exe> index <dir>` as a child process and reports its stdout on
/// success or its stderr on failure.
pub struct IndexerProcess {
    exe: PathBuf,
}

impl IndexerProcess {
    pub fn new(exe: PathBuf) -> Self {
        Self { exe }
    }

    pub fn current() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// The indexer runs inside `dir`, so it sees the same tree whichever
    /// directory the daemon itself was started from.
    #[tracing::instrument(skip(self), fields(exe = %self.exe.display()))]
    pub fn run(&self, dir: &Path) -> Result<String, String> {
        if !dir.is_dir() {
            return Err(IndexError::NotFound(dir.to_path_buf()).to_string());
        }
        let output = Command::new(&self.exe)
            .arg("index")
            .arg(".")
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("Failed to start indexer: {e}"))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(if stderr.is_empty() {
                format!("Indexer exited with {}", output.status)
            } else {
                stderr
            })
        }
    }
}

fn existing_project_id(manifest_path: &Path) -> Option<String> {
    let text = fs::read_to_string(manifest_path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&text).ok()?;
    value
        .get("projectId")
        .and_then(|id| id.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && SKIPPED_DIRS
            .iter()
            .any(|name| entry.file_name() == std::ffi::OsStr::new(name))
}

fn is_skipped_file(entry: &DirEntry) -> bool {
    SKIPPED_FILES
        .iter()
        .any(|name| entry.file_name() == std::ffi::OsStr::new(name))
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_indexable(path: &Path) -> Result<(String, u64, String), SkipReason> {
    let meta = fs::metadata(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    if meta.len() > MAX_FILE_BYTES {
        return Err(SkipReason::TooLarge);
    }
    let bytes = fs::read(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    if looks_binary(&bytes) {
        return Err(SkipReason::Binary);
    }
    let modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    Ok((String::from_utf8_lossy(&bytes).into_owned(), meta.len(), modified))
}

/// A null byte in the first 4 KiB marks a file as binary.
fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_BYTES).any(|b| *b == 0)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), IndexError> {
    fs::write(path, contents).map_err(|source| IndexError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_indexer_process_runs_inside_target_dir() {
        use std::os::unix::fs::PermissionsExt;

        let bin = TempDir::new().unwrap();
        let exe = bin.path().join("fake-minty");
        fs::write(&exe, "#!/bin/sh\necho \"$1 $2 $(pwd -P)\"\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
        let target = project();
        let indexer = IndexerProcess::new(exe);

        let output = indexer.run(target.path()).unwrap();
        let expected = format!("index . {}", target.path().canonicalize().unwrap().display());
        assert_eq!(output.trim(), expected);

        let missing = target.path().join("nope");
        let err = indexer.run(&missing).unwrap_err();
        assert!(err.starts_with("Directory not found"), "{err}");
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(root.join(".env"), "KEY=1").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();
        fs::write(root.join("yarn.lock"), "lock").unwrap();
        fs::write(root.join("logo.png"), [0x89, b'P', 0, 0, 1]).unwrap();
        dir
    }

    #[test]
    fn test_index_writes_manifest_and_markdown() {
        let dir = project();
        let report = index_directory(dir.path()).unwrap();

        assert_eq!(report.total_files, 2);
        assert_eq!(report.skipped, vec![("logo.png".to_string(), SkipReason::Binary)]);

        let manifest: Manifest =
            serde_json::from_str(&fs::read_to_string(&report.manifest_path).unwrap()).unwrap();
        let paths: Vec<&str> = manifest.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec![".env", "src/main.rs"]);
        assert_eq!(manifest.version, MANIFEST_VERSION);
        assert_eq!(manifest.total_tokens, report.total_tokens);

        let markdown = read_context(dir.path()).unwrap();
        assert!(markdown.starts_with("# Codebase Dump\n\n"));
        assert!(markdown.contains("## File: src/main.rs\n```\nfn main() {}\n\n```\n\n"));
        assert!(!markdown.contains("node_modules"));
    }

    #[test]
    fn test_project_id_survives_reindex() {
        let dir = project();
        let first = index_directory(dir.path()).unwrap();
        let second = index_directory(dir.path()).unwrap();

        assert_eq!(first.project_id, second.project_id);
        // Outputs of the previous run are not indexed.
        assert_eq!(second.total_files, 2);
    }

    #[test]
    fn test_large_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.txt"), vec![b'a'; (MAX_FILE_BYTES + 1) as usize]).unwrap();
        let report = index_directory(dir.path()).unwrap();
        assert_eq!(report.total_files, 0);
        assert_eq!(report.skipped[0].1, SkipReason::TooLarge);
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = index_directory(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
        assert!(read_context(&dir.path().join("nope")).is_none());
    }

    #[test]
    fn test_indexer_process_reports_stderr() {
        // `sh index <dir>` fails: there is no script named "index" here.
        let dir = TempDir::new().unwrap();
        let err = IndexerProcess::new(PathBuf::from("/bin/sh"))
            .run(dir.path())
            .unwrap_err();
        assert!(err.contains("index"), "{err}");
    }

    #[test]
    fn test_indexer_process_returns_stdout() {
        let output = IndexerProcess::new(PathBuf::from("/bin/echo"))
            .run(Path::new("proj"))
            .unwrap();
        assert_eq!(output, "index proj\n");
    }

    proptest! {
        #[test]
        fn prop_token_estimate_is_ceiling_quarter(s in "\\PC{0,64}") {
            let chars = s.chars().count() as u64;
            let tokens = estimate_tokens(&s);
            prop_assert!(tokens * 4 >= chars);
            prop_assert!(tokens * 4 < chars + 4 || chars == 0);
        }
    }
}
