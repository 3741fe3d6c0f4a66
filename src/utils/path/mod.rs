//! Path and URL utilities.
//!
//! - [`route`]: link syntax helpers (`is_external_link`, `split_path_fragment`, relative prefixes)
//! - file helpers shared by every phase that writes under the output directory

pub mod route;

use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Write `contents` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Remove `dir` if present and create it empty.
pub fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("failed to clear {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))
}

/// Render `path` relative to `base` with forward slashes, for reports.
pub fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
