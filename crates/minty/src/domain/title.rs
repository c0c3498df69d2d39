use std::path::Path;

/// Tab title for a working directory: `~` for home, `root` for `/`,
/// otherwise the last path component.
pub fn suggested_title(cwd: &str, home: &str) -> String {
    let trimmed = cwd.trim_end_matches('/');
    let home = home.trim_end_matches('/');
    if !home.is_empty() && trimmed == home {
        return "~".to_string();
    }
    if trimmed.is_empty() && cwd.starts_with('/') {
        return "root".to_string();
    }
    Path::new(trimmed)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}
