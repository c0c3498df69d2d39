//! Executables reachable through the session PATH.

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;

use tracing::trace;

pub struct CommandCatalog {
    dirs: Vec<PathBuf>,
}

impl CommandCatalog {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Every executable name across the PATH directories, sorted and unique.
    /// Unreadable directories are skipped.
    pub fn list(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for dir in &self.dirs {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    trace!(dir = %dir.display(), error = %e, "Skipping PATH entry");
                    continue;
                }
            };
            for entry in entries.flatten() {
                if is_executable(&entry.path()) {
                    names.insert(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }
        names.into_iter().collect()
    }

    /// First PATH match for `name`. Names containing a slash are never
    /// looked up.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let name = name.trim();
        if name.is_empty() || name.contains('/') {
            return None;
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, mode: u32) {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn test_list_is_sorted_unique_and_executable_only() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        touch(a.path(), "zeta", 0o755);
        touch(a.path(), "alpha", 0o755);
        touch(b.path(), "alpha", 0o755);
        touch(b.path(), "notes.txt", 0o644);
        fs::create_dir(b.path().join("subdir")).unwrap();

        let catalog = CommandCatalog::new(vec![
            a.path().to_path_buf(),
            PathBuf::from("/definitely/missing"),
            b.path().to_path_buf(),
        ]);

        assert_eq!(catalog.list(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_find_prefers_earlier_directories() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        touch(a.path(), "tool", 0o755);
        touch(b.path(), "tool", 0o755);
        let catalog = CommandCatalog::new(vec![a.path().to_path_buf(), b.path().to_path_buf()]);

        assert_eq!(catalog.find("tool"), Some(a.path().join("tool")));
        assert_eq!(catalog.find("missing"), None);
        assert_eq!(catalog.find("../tool"), None);
        assert_eq!(catalog.find(""), None);
    }
}
