//! Shell and environment resolution for spawned processes.
//!
//! GUI launchers often hand the daemon a minimal PATH, so well-known
//! toolchain directories are put in front of whatever was inherited.

use std::collections::HashMap;
use std::collections::HashSet;
use std::ffi::CStr;
use std::path::Path;
use std::path::PathBuf;

/// Directories added to the front of PATH, in order. A leading `~/` is
/// relative to the user's home directory.
pub const EXTRA_PATH_DIRS: &[&str] = &[
    "~/.local/bin",
    "~/.cargo/bin",
    "~/.npm-global/bin",
    "~/go/bin",
    "~/.deno/bin",
    "~/.bun/bin",
    "~/bin",
    "/usr/local/bin",
    "/usr/bin",
    "/bin",
    "/usr/sbin",
    "/sbin",
    "/snap/bin",
    "/opt/homebrew/bin",
    "/home/linuxbrew/.linuxbrew/bin",
];

const FALLBACK_SHELLS: &[&str] = &["/bin/bash", "/bin/sh"];

#[derive(Debug, Clone)]
pub struct ShellEnvironment {
    shell: String,
    home: PathBuf,
    user: String,
    env: HashMap<String, String>,
}

impl ShellEnvironment {
    /// Resolves everything from the current process and the passwd database.
    pub fn detect() -> Self {
        let base: HashMap<String, String> = std::env::vars().collect();
        let account = passwd_entry();
        let home = non_empty(base.get("HOME"))
            .map(PathBuf::from)
            .or_else(|| account.as_ref().map(|(_, dir)| dir.clone()))
            .unwrap_or_else(|| PathBuf::from("/"));
        let user = non_empty(base.get("USER"))
            .or_else(|| non_empty(base.get("LOGNAME")))
            .map(str::to_string)
            .or_else(|| account.map(|(name, _)| name))
            .unwrap_or_else(|| "unknown".to_string());
        Self::from_parts(base, home, user)
    }

    pub fn from_parts(mut env: HashMap<String, String>, home: PathBuf, user: String) -> Self {
        let shell = default_shell(&env);
        let path = augmented_path(env.get("PATH").map(String::as_str).unwrap_or(""), &home);

        env.insert("PATH".to_string(), path);
        env.insert("HOME".to_string(), home.to_string_lossy().into_owned());
        env.insert("USER".to_string(), user.clone());
        env.insert("TERM".to_string(), "xterm-256color".to_string());
        env.insert("COLORTERM".to_string(), "truecolor".to_string());

        Self {
            shell,
            home,
            user,
            env,
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn path_dirs(&self) -> Vec<PathBuf> {
        self.env
            .get("PATH")
            .map(|path| std::env::split_paths(path).collect())
            .unwrap_or_default()
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

fn default_shell(env: &HashMap<String, String>) -> String {
    if let Some(shell) = non_empty(env.get("SHELL")) {
        return shell.to_string();
    }
    FALLBACK_SHELLS
        .iter()
        .find(|candidate| Path::new(candidate).exists())
        .unwrap_or(&"/bin/sh")
        .to_string()
}

fn expand_home(dir: &str, home: &Path) -> String {
    match dir.strip_prefix("~/") {
        Some(rest) => home.join(rest).to_string_lossy().into_owned(),
        None => dir.to_string(),
    }
}

fn augmented_path(existing: &str, home: &Path) -> String {
    let present: HashSet<&str> = existing.split(':').filter(|d| !d.is_empty()).collect();
    let mut seen = HashSet::new();
    let extra: Vec<String> = EXTRA_PATH_DIRS
        .iter()
        .map(|dir| expand_home(dir, home))
        .filter(|dir| !present.contains(dir.as_str()))
        .filter(|dir| seen.insert(dir.clone()))
        .collect();

    match (extra.is_empty(), existing.is_empty()) {
        (true, _) => existing.to_string(),
        (false, true) => extra.join(":"),
        (false, false) => format!("{}:{}", extra.join(":"), existing),
    }
}

/// Login name and home directory of the effective user.
fn passwd_entry() -> Option<(String, PathBuf)> {
    let mut buf = vec![0u8; 4096];
    // SAFETY: passwd is plain-old-data and fully written by getpwuid_r on success.
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();
    // SAFETY: all pointers reference live locals; `buf` outlives the reads of
    // the strings getpwuid_r stores inside it.
    let rc = unsafe {
        libc::getpwuid_r(
            libc::geteuid(),
            &mut pwd,
            buf.as_mut_ptr().cast(),
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() || pwd.pw_name.is_null() || pwd.pw_dir.is_null() {
        return None;
    }
    // SAFETY: non-null, NUL-terminated strings pointing into `buf`.
    let (name, dir) = unsafe {
        (
            CStr::from_ptr(pwd.pw_name).to_string_lossy().into_owned(),
            CStr::from_ptr(pwd.pw_dir).to_string_lossy().into_owned(),
        )
    };
    Some((name, PathBuf::from(dir)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_path_prepends_missing_dirs_in_order() {
        let shell_env = ShellEnvironment::from_parts(
            env_with(&[("PATH", "/usr/bin:/custom/bin")]),
            PathBuf::from("/home/u"),
            "u".to_string(),
        );
        let path = &shell_env.env()["PATH"];
        assert!(path.starts_with("/home/u/.local/bin:/home/u/.cargo/bin:"));
        assert!(path.ends_with(":/usr/bin:/custom/bin"));
        assert_eq!(path.matches("/usr/bin:").count(), 1);
        let local = path.find("/usr/local/bin").unwrap();
        let bin = path.find(":/bin:").unwrap();
        assert!(local < bin);
    }

    #[test]
    fn test_empty_path_gets_only_extra_dirs() {
        let shell_env = ShellEnvironment::from_parts(
            HashMap::new(),
            PathBuf::from("/home/u"),
            "u".to_string(),
        );
        let dirs = shell_env.path_dirs();
        assert_eq!(dirs.len(), EXTRA_PATH_DIRS.len());
        assert_eq!(dirs[0], PathBuf::from("/home/u/.local/bin"));
    }

    #[test]
    fn test_forced_variables() {
        let shell_env = ShellEnvironment::from_parts(
            env_with(&[("TERM", "dumb"), ("HOME", "/elsewhere"), ("EDITOR", "vi")]),
            PathBuf::from("/home/u"),
            "u".to_string(),
        );
        let env = shell_env.env();
        assert_eq!(env["TERM"], "xterm-256color");
        assert_eq!(env["COLORTERM"], "truecolor");
        assert_eq!(env["HOME"], "/home/u");
        assert_eq!(env["USER"], "u");
        assert_eq!(env["EDITOR"], "vi");
    }

    #[test]
    fn test_shell_comes_from_env_with_fallback() {
        let with_shell = ShellEnvironment::from_parts(
            env_with(&[("SHELL", "/usr/bin/zsh")]),
            PathBuf::from("/home/u"),
            "u".to_string(),
        );
        assert_eq!(with_shell.shell(), "/usr/bin/zsh");

        let without = ShellEnvironment::from_parts(
            env_with(&[("SHELL", "")]),
            PathBuf::from("/home/u"),
            "u".to_string(),
        );
        assert!(FALLBACK_SHELLS.contains(&without.shell()));
    }

    #[test]
    fn test_detect_always_resolves_home_and_user() {
        let shell_env = ShellEnvironment::detect();
        assert!(!shell_env.home().as_os_str().is_empty());
        assert!(!shell_env.user().is_empty());
        assert!(!shell_env.shell().is_empty());
    }
}
