//! Link syntax helpers.
//!
//! Pure string functions; URL resolution against a base lives in `core::url`.

/// Check if a link carries a URL scheme (`https:`, `mailto:`, `data:`, ...).
///
/// A valid scheme has at least one character before the colon and only
/// contains ASCII alphanumerics or `+`, `-`, `.`.
#[inline]
pub fn is_external_link(link: &str) -> bool {
    link.find(':').is_some_and(|pos| {
        pos > 0
            && link[..pos]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Split a link into path and fragment (empty when there is no `#`).
#[inline]
pub fn split_path_fragment(url: &str) -> (&str, &str) {
    url.split_once('#').unwrap_or((url, ""))
}

/// `../` repeated `depth` times; the empty string at the bundle root.
#[inline]
pub fn relative_prefix(depth: usize) -> String {
    "../".repeat(depth)
}

/// Reference from a document `depth` directories below the root to a
/// root-relative target such as `assets/fonts/inter.woff2`.
#[inline]
pub fn relative_to_root(depth: usize, target: &str) -> String {
    format!("{}{}", relative_prefix(depth), target.trim_start_matches('/'))
}
