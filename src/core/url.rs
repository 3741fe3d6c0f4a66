//! Route path type and URL helpers.
//!
//! - Internal representation: always decoded (human-readable)
//! - Browser boundary: decode on input, encode on output

use std::borrow::Borrow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

/// Characters escaped when a decoded segment goes back into a URL.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Decoded same-origin page path.
///
/// Invariants:
/// - Always starts with `/`
/// - No trailing slash, except the root `/`
/// - No query string, fragment, empty, `.` or `..` segments
/// - Percent-decoded
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePath(Arc<str>);

impl RoutePath {
    /// The homepage.
    pub fn root() -> Self {
        Self(Arc::from("/"))
    }

    /// Normalize a decoded path (query and fragment are dropped).
    pub fn from_decoded(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let segments: Vec<&str> = path
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .collect();

        if segments.is_empty() {
            return Self::root();
        }
        Self(Arc::from(format!("/{}", segments.join("/"))))
    }

    /// Route of an absolute URL (its percent-encoded path is decoded).
    pub fn from_url(url: &Url) -> Self {
        Self::from_decoded(&decode(url.path()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.as_ref() == "/"
    }

    /// Path segments, none for the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Directory depth of the route's `index.html` below the bundle root.
    ///
    /// `/` -> 0, `/about` -> 1, `/blog/post` -> 2
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// `<root>/index.html` or `<root>/a/b/index.html`.
    pub fn index_file(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for seg in self.segments() {
            path.push(seg);
        }
        path.push("index.html");
        path
    }

    /// Flat, filesystem-safe name: `home` for the root, `blog_post` for `/blog/post`.
    pub fn safe_name(&self) -> String {
        if self.is_root() {
            return "home".to_string();
        }
        self.segments().collect::<Vec<_>>().join("_")
    }

    /// Percent-encoded path for use in a URL.
    pub fn to_encoded(&self) -> String {
        if self.is_root() {
            return "/".to_string();
        }
        self.segments()
            .map(|seg| utf8_percent_encode(seg, SEGMENT).to_string())
            .fold(String::new(), |acc, seg| acc + "/" + &seg)
    }

    /// Absolute URL of this route on `origin`.
    pub fn to_url(&self, origin: &Url) -> Result<Url, url::ParseError> {
        origin.join(&self.to_encoded())
    }

    /// Relative link to this route from a document at `from_depth`
    /// (clean URLs, so `/about` from `/blog/post` is `../../about`).
    pub fn relative_from(&self, from_depth: usize) -> String {
        let target = self.as_str().trim_start_matches('/');
        match (from_depth, target.is_empty()) {
            (0, true) => "./".to_string(),
            (0, false) => format!("./{target}"),
            (d, _) => format!("{}{}", "../".repeat(d), target),
        }
    }
}

impl Default for RoutePath {
    fn default() -> Self {
        Self::root()
    }
}

impl std::fmt::Display for RoutePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoutePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoutePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Root first, then lexicographic.
impl Ord for RoutePath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (!self.is_root(), self.as_str()).cmp(&(!other.is_root(), other.as_str()))
    }
}

impl PartialOrd for RoutePath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for RoutePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RoutePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_decoded(&s))
    }
}

// ============================================================================
// URL helpers
// ============================================================================

/// Percent-decode, keeping the input when it is not valid UTF-8.
pub fn decode(s: &str) -> String {
    percent_decode_str(s)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Host without a leading `www.`, lowercased.
fn bare_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// Same site: identical host (ignoring `www.`) and port; http and https are equivalent.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    matches!(a.scheme(), "http" | "https")
        && matches!(b.scheme(), "http" | "https")
        && bare_host(a).is_some()
        && bare_host(a) == bare_host(b)
        && a.port() == b.port()
}

/// Parse the user-supplied site URL, accepting a bare host (`example.framer.website`).
pub fn parse_site_url(input: &str) -> Result<Url, url::ParseError> {
    let trimmed = input.trim();
    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{trimmed}"))?,
        Err(e) => return Err(e),
    };
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    Ok(origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_decoded_normalizes() {
        assert_eq!(RoutePath::from_decoded("").as_str(), "/");
        assert_eq!(RoutePath::from_decoded("/").as_str(), "/");
        assert_eq!(RoutePath::from_decoded("/about/").as_str(), "/about");
        assert_eq!(RoutePath::from_decoded("about").as_str(), "/about");
        assert_eq!(RoutePath::from_decoded("/blog//post/").as_str(), "/blog/post");
        assert_eq!(RoutePath::from_decoded("/a?x=1#top").as_str(), "/a");
        assert_eq!(RoutePath::from_decoded("/../etc/passwd").as_str(), "/etc/passwd");
    }

    #[test]
    fn test_from_url_decodes() {
        let url = Url::parse("https://site.com/caf%C3%A9/menu/?x=1").unwrap();
        assert_eq!(RoutePath::from_url(&url).as_str(), "/café/menu");
    }

    #[test]
    fn test_depth_and_index_file() {
        let root = Path::new("/out/public");
        assert_eq!(RoutePath::root().depth(), 0);
        assert_eq!(
            RoutePath::root().index_file(root),
            PathBuf::from("/out/public/index.html")
        );
        let route = RoutePath::from_decoded("/blog/post");
        assert_eq!(route.depth(), 2);
        assert_eq!(
            route.index_file(root),
            PathBuf::from("/out/public/blog/post/index.html")
        );
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(RoutePath::root().safe_name(), "home");
        assert_eq!(RoutePath::from_decoded("/blog/post").safe_name(), "blog_post");
    }

    #[test]
    fn test_ordering_root_first() {
        let mut routes = vec![
            RoutePath::from_decoded("/b"),
            RoutePath::from_decoded("/a/z"),
            RoutePath::root(),
            RoutePath::from_decoded("/a"),
        ];
        routes.sort();
        let names: Vec<_> = routes.iter().map(RoutePath::as_str).collect();
        assert_eq!(names, vec!["/", "/a", "/a/z", "/b"]);
    }

    #[test]
    fn test_to_url_round_trips_encoding() {
        let origin = Url::parse("https://site.com/").unwrap();
        let route = RoutePath::from_decoded("/café menu");
        let url = route.to_url(&origin).unwrap();
        assert_eq!(url.as_str(), "https://site.com/caf%C3%A9%20menu");
        assert_eq!(RoutePath::from_url(&url), route);
    }

    #[test]
    fn test_relative_from() {
        let about = RoutePath::from_decoded("/about");
        assert_eq!(about.relative_from(0), "./about");
        assert_eq!(about.relative_from(2), "../../about");
        assert_eq!(RoutePath::root().relative_from(0), "./");
        assert_eq!(RoutePath::root().relative_from(1), "../");
    }

    #[test]
    fn test_same_origin() {
        let a = Url::parse("https://site.com/").unwrap();
        assert!(same_origin(&a, &Url::parse("https://www.site.com/x").unwrap()));
        assert!(same_origin(&a, &Url::parse("http://site.com/x").unwrap()));
        assert!(!same_origin(&a, &Url::parse("https://cdn.site.com/x").unwrap()));
        assert!(!same_origin(&a, &Url::parse("https://site.com:8443/x").unwrap()));
        assert!(!same_origin(&a, &Url::parse("mailto:me@site.com").unwrap()));
    }

    #[test]
    fn test_parse_site_url() {
        let url = parse_site_url("example.framer.website").unwrap();
        assert_eq!(url.as_str(), "https://example.framer.website/");
        let url = parse_site_url("https://example.com/about?x=1#y").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
        assert!(parse_site_url("http://").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let route = RoutePath::from_decoded("/a/b");
        let json = serde_json::to_string(&route).unwrap();
        assert_eq!(json, "\"/a/b\"");
        let back: RoutePath = serde_json::from_str("\"/a/b/\"").unwrap();
        assert_eq!(back, route);
    }
}
