//! Rules for the run-to-completion command path: `cd` interception,
//! path resolution and output cleanup.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub const TIMEOUT_EXIT_CODE: i32 = 124;
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 1;

static CD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^cd(?:\s+(.*))?$").expect("cd pattern is a valid regex")
});

static CSI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\x1B\[[0-9;]*[a-zA-Z]").expect("CSI pattern is a valid regex")
});

/// Outcome of one `execute` call. Serialized with the camelCase
/// `exitCode` key the UI reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub output: String,
    pub error: String,
    pub cwd: String,
    #[serde(rename = "exitCode", skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl CommandResult {
    pub fn changed_dir(cwd: impl Into<String>) -> Self {
        Self {
            success: true,
            output: String::new(),
            error: String::new(),
            cwd: cwd.into(),
            exit_code: None,
        }
    }

    pub fn cd_failed(error: impl Into<String>, cwd: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: error.into(),
            cwd: cwd.into(),
            exit_code: None,
        }
    }

    pub fn completed(raw_output: &str, exit_code: i32, cwd: impl Into<String>) -> Self {
        Self {
            success: exit_code == 0,
            output: normalize_output(raw_output),
            error: String::new(),
            cwd: cwd.into(),
            exit_code: Some(exit_code),
        }
    }

    /// Partial output is returned exactly as the terminal produced it.
    pub fn timed_out(raw_output: &str, timeout_secs: u64, cwd: impl Into<String>) -> Self {
        Self {
            success: false,
            output: raw_output.to_string(),
            error: format!("Command timed out after {} seconds", timeout_secs),
            cwd: cwd.into(),
            exit_code: Some(TIMEOUT_EXIT_CODE),
        }
    }

    pub fn spawn_failed(error: impl Into<String>, cwd: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: error.into(),
            cwd: cwd.into(),
            exit_code: Some(SPAWN_FAILURE_EXIT_CODE),
        }
    }
}

/// Returns the raw `cd` argument when `command` is a bare `cd` invocation.
///
/// Anything else, including `cdk` or multi-line input, is an ordinary
/// command for the shell.
pub fn parse_cd(command: &str) -> Option<String> {
    let captures = CD_PATTERN.captures(command.trim())?;
    let raw = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
    Some(unquote_single_word(raw))
}

fn unquote_single_word(raw: &str) -> String {
    match shell_words::split(raw) {
        Ok(words) if words.len() == 1 => words.into_iter().next().unwrap_or_default(),
        Ok(words) if words.is_empty() => String::new(),
        _ => raw.to_string(),
    }
}

/// Resolves a `cd` argument against the tracked directory.
///
/// `previous` is the directory recorded before the last successful `cd`;
/// when there is none, `-` stays where it is.
pub fn resolve_cd_target(target: &str, cwd: &Path, previous: Option<&Path>, home: &Path) -> PathBuf {
    match target {
        "" | "~" => home.to_path_buf(),
        "-" => previous.unwrap_or(cwd).to_path_buf(),
        _ => {
            if let Some(rest) = target.strip_prefix("~/") {
                normalize_lexically(&home.join(rest))
            } else {
                normalize_lexically(&cwd.join(target))
            }
        }
    }
}

/// Folds `.` and `..` without touching the filesystem, the way a shell's
/// logical `cd` does.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !path.is_absolute() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(if path.is_absolute() { "/" } else { "." });
    }
    out
}

/// Strips CSI sequences and turns `\r\n` and lone `\r` into `\n`.
pub fn normalize_output(raw: &str) -> String {
    let stripped = CSI_PATTERN.replace_all(raw, "");
    stripped.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_cd_variants() {
        assert_eq!(parse_cd("cd"), Some(String::new()));
        assert_eq!(parse_cd("  cd ..  "), Some("..".to_string()));
        assert_eq!(parse_cd("cd ~/src"), Some("~/src".to_string()));
        assert_eq!(parse_cd("cd 'My Documents'"), Some("My Documents".to_string()));
        assert_eq!(parse_cd("cd foo && ls"), Some("foo && ls".to_string()));
    }

    #[test]
    fn test_parse_cd_ignores_other_commands() {
        assert_eq!(parse_cd("cdk deploy"), None);
        assert_eq!(parse_cd("echo cd"), None);
        assert_eq!(parse_cd("cd foo\nls"), None);
    }

    #[test]
    fn test_resolve_targets() {
        let home = Path::new("/home/u");
        let cwd = Path::new("/home/u/project");
        let prev = Path::new("/tmp");

        assert_eq!(resolve_cd_target("", cwd, None, home), home);
        assert_eq!(resolve_cd_target("~", cwd, None, home), home);
        assert_eq!(resolve_cd_target("-", cwd, Some(prev), home), prev);
        assert_eq!(resolve_cd_target("-", cwd, None, home), cwd);
        assert_eq!(
            resolve_cd_target("~/notes/../src", cwd, None, home),
            PathBuf::from("/home/u/src")
        );
        assert_eq!(resolve_cd_target("..", cwd, None, home), PathBuf::from("/home/u"));
        assert_eq!(resolve_cd_target("/etc", cwd, None, home), PathBuf::from("/etc"));
        assert_eq!(
            resolve_cd_target("./lib", cwd, None, home),
            PathBuf::from("/home/u/project/lib")
        );
    }

    #[test]
    fn test_normalize_lexically_stops_at_root() {
        assert_eq!(normalize_lexically(Path::new("/a/../../..")), PathBuf::from("/"));
        assert_eq!(normalize_lexically(Path::new("/a/./b/")), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_normalize_output_strips_csi_and_carriage_returns() {
        let raw = "\x1b[1;32mok\x1b[0m\r\nnext\rline\x1b[K";
        assert_eq!(normalize_output(raw), "ok\nnext\nline");
    }

    #[test]
    fn test_result_constructors() {
        let done = CommandResult::completed("hi\r\n", 0, "/w");
        assert!(done.success);
        assert_eq!(done.output, "hi\n");
        assert_eq!(done.exit_code, Some(0));

        let failed = CommandResult::completed("", 2, "/w");
        assert!(!failed.success);

        let timeout = CommandResult::timed_out("\x1b[1mpartial\r\n", 60, "/w");
        assert_eq!(timeout.output, "\x1b[1mpartial\r\n");
        assert!(!timeout.success);
        assert_eq!(timeout.exit_code, Some(TIMEOUT_EXIT_CODE));
        assert_eq!(timeout.error, "Command timed out after 60 seconds");

        let json = serde_json::to_value(CommandResult::changed_dir("/w")).unwrap();
        assert!(json.get("exitCode").is_none());
        let json = serde_json::to_value(CommandResult::spawn_failed("boom", "/w")).unwrap();
        assert_eq!(json["exitCode"], 1);
    }

    proptest! {
        #[test]
        fn prop_normalized_output_has_no_carriage_returns(s in "[a-z\r\n\x1b\\[0-9;m]{0,64}") {
            let out = normalize_output(&s);
            prop_assert!(!out.contains('\r'));
        }

        #[test]
        fn prop_normalized_path_has_no_dot_components(parts in prop::collection::vec(prop_oneof!["[a-z]{1,4}", Just(".".to_string()), Just("..".to_string())], 0..8)) {
            let path = PathBuf::from(format!("/{}", parts.join("/")));
            let normalized = normalize_lexically(&path);
            prop_assert!(normalized.is_absolute());
            prop_assert!(normalized.components().all(|c| !matches!(c, Component::CurDir | Component::ParentDir)));
        }
    }
}
