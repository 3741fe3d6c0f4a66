//! Request URL to bundle file resolution.

use std::path::{Path, PathBuf};

use crate::core::decode;

/// Resolve a request URL to a file under `root`.
///
/// Clean URLs map to `<route>/index.html`; `/about.html` style requests are
/// honoured too, so links copied from a host without clean URLs still work.
pub fn resolve_path(url: &str, root: &Path) -> Option<PathBuf> {
    let segments = normalize_url(url)?;
    let local = segments.iter().fold(root.to_path_buf(), |p, s| p.join(s));

    // Symlinks inside the bundle must not point outside it
    let canonical = local.canonicalize().ok();
    let root_canonical = root.canonicalize().ok()?;
    if let Some(canonical) = canonical {
        if !canonical.starts_with(&root_canonical) {
            return None;
        }
        if canonical.is_file() {
            return Some(canonical);
        }
        let index = canonical.join("index.html");
        if index.is_file() {
            return Some(index);
        }
        return None;
    }

    // `/about` -> `about.html` when no directory exists
    let last = segments.last()?;
    let html = local.with_file_name(format!("{last}.html"));
    let html = html.canonicalize().ok()?;
    (html.starts_with(&root_canonical) && html.is_file()).then_some(html)
}

/// Decoded path segments with query and fragment removed.
///
/// Returns `None` for any `..` segment.
fn normalize_url(url: &str) -> Option<Vec<String>> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = decode(path);

    let mut segments = Vec::new();
    for seg in decoded.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => return None,
            s => segments.push(s.to_string()),
        }
    }
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn bundle() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "home").unwrap();
        fs::create_dir_all(dir.path().join("about")).unwrap();
        fs::write(dir.path().join("about/index.html"), "about").unwrap();
        fs::write(dir.path().join("legal.html"), "legal").unwrap();
        fs::create_dir_all(dir.path().join("assets/css")).unwrap();
        fs::write(dir.path().join("assets/css/site.css"), "body{}").unwrap();
        dir
    }

    fn read(path: Option<PathBuf>) -> String {
        fs::read_to_string(path.expect("path should resolve")).unwrap()
    }

    #[test]
    fn test_resolve_clean_urls() {
        let dir = bundle();
        assert_eq!(read(resolve_path("/", dir.path())), "home");
        assert_eq!(read(resolve_path("/about", dir.path())), "about");
        assert_eq!(read(resolve_path("/about/?ref=nav", dir.path())), "about");
        assert_eq!(read(resolve_path("/legal", dir.path())), "legal");
        assert_eq!(read(resolve_path("/assets/css/site.css", dir.path())), "body{}");
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = bundle();
        assert!(resolve_path("/../secret", dir.path()).is_none());
        assert!(resolve_path("/assets/%2e%2e/%2e%2e/x", dir.path()).is_none());
    }

    #[test]
    fn test_resolve_missing() {
        let dir = bundle();
        assert!(resolve_path("/pricing", dir.path()).is_none());
        assert!(resolve_path("/assets/css", dir.path()).is_none());
    }
}
