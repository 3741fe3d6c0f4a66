//! Link classification utilities.

use crate::utils::path::route::is_external_link;

/// Syntactic classification of an `href` as written in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind<'a> {
    /// `http://` or `https://` URL (may still be same-origin).
    Absolute(&'a str),
    /// Protocol-relative URL (`//cdn.example.com/x.js`).
    ProtocolRelative(&'a str),
    /// Any other scheme (`mailto:`, `tel:`, `javascript:`, `data:`). Value is the scheme.
    Scheme(&'a str),
    /// Pure fragment/anchor link (`#section`). Value is anchor without `#`.
    Fragment(&'a str),
    /// Site-root-relative path (`/about`).
    SiteRoot(&'a str),
    /// Document-relative path (`./about`, `../blog`, `contact`).
    Relative(&'a str),
}

impl<'a> LinkKind<'a> {
    /// Parse a (trimmed, unescaped) link string into its syntactic kind.
    pub fn parse(link: &'a str) -> Self {
        if link.starts_with("//") {
            Self::ProtocolRelative(link)
        } else if is_external_link(link) {
            if Self::is_http(link) {
                Self::Absolute(link)
            } else {
                // is_external_link guarantees a colon
                Self::Scheme(link.split(':').next().unwrap_or(link))
            }
        } else if let Some(anchor) = link.strip_prefix('#') {
            Self::Fragment(anchor)
        } else if link.starts_with('/') {
            Self::SiteRoot(link)
        } else {
            Self::Relative(link)
        }
    }

    /// Check if link is HTTP/HTTPS (case-insensitive scheme).
    #[inline]
    pub fn is_http(link: &str) -> bool {
        let lower = link.get(..8).unwrap_or(link).to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    /// Whether the link can point at a fetchable resource at all.
    pub fn is_resolvable(&self) -> bool {
        !matches!(self, Self::Scheme(_) | Self::Fragment(_))
    }
}

/// Extensions that mark a link as a downloadable file rather than a page.
pub const NON_PAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico", "pdf", "zip", "gz", "mp4", "webm",
    "mov", "mp3", "wav", "woff", "woff2", "ttf", "otf", "css", "js", "mjs", "json", "xml", "txt",
    "csv", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
];

/// Lowercase extension of the last path segment, if any.
pub fn path_extension(path: &str) -> Option<String> {
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// Whether `path` ends in a non-page file extension.
pub fn is_file_path(path: &str) -> bool {
    path_extension(path).is_some_and(|ext| NON_PAGE_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute() {
        assert_eq!(
            LinkKind::parse("https://example.com"),
            LinkKind::Absolute("https://example.com")
        );
        assert_eq!(
            LinkKind::parse("HTTP://EXAMPLE.COM"),
            LinkKind::Absolute("HTTP://EXAMPLE.COM")
        );
        assert_eq!(
            LinkKind::parse("//cdn.example.com/a.js"),
            LinkKind::ProtocolRelative("//cdn.example.com/a.js")
        );
    }

    #[test]
    fn test_parse_schemes() {
        assert_eq!(LinkKind::parse("mailto:user@example.com"), LinkKind::Scheme("mailto"));
        assert_eq!(LinkKind::parse("tel:+1234567890"), LinkKind::Scheme("tel"));
        assert_eq!(LinkKind::parse("javascript:void(0)"), LinkKind::Scheme("javascript"));
        assert!(!LinkKind::parse("data:image/png;base64,AA").is_resolvable());
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(LinkKind::parse("#top"), LinkKind::Fragment("top"));
        assert_eq!(LinkKind::parse("/about"), LinkKind::SiteRoot("/about"));
        assert_eq!(LinkKind::parse("./about"), LinkKind::Relative("./about"));
        assert_eq!(LinkKind::parse("contact"), LinkKind::Relative("contact"));
        assert!(LinkKind::parse("/about").is_resolvable());
    }

    #[test]
    fn test_file_paths() {
        assert!(is_file_path("/files/brochure.PDF"));
        assert!(is_file_path("/a/b/logo.png"));
        assert!(!is_file_path("/about"));
        assert!(!is_file_path("/blog/v1.2"));
        assert!(!is_file_path("/.well-known"));
        assert_eq!(path_extension("/x/y.tar.gz").as_deref(), Some("gz"));
    }
}
