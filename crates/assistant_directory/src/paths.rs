use std::path::{Path, PathBuf};

pub const DEFAULT_DIRECTORY_FILE: &str = "assistants.csv";

/// Resolves a configured directory path against `cwd`; blank means the default file.
#[must_use]
pub fn resolve_directory_path(cwd: &Path, configured: Option<&str>) -> PathBuf {
    let configured = configured
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_DIRECTORY_FILE);
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
