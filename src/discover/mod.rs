//! Route discovery.
//!
//! The route set is the union of every `<a href>` on the rendered homepage and
//! every `<loc>` in the sitemap, filtered to same-origin pages and sorted.
//! It is computed once and never changes for the rest of the run.

pub mod sitemap;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::browser::{BrowserError, PageWait, Renderer, Viewport};
use crate::config::CaptureConfig;
use crate::core::{LinkKind, RoutePath, decode, is_file_path, path_extension, same_origin};
use crate::utils::{html, plural_count};
use crate::{debug, log};

// ============================================================================
// Types
// ============================================================================

/// Where a route was first seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteSource {
    Seed,
    Dom,
    Sitemap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: RoutePath,
    pub source: RouteSource,
}

/// Why a link is not a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// `mailto:`, `tel:`, `javascript:`, `data:` ...
    Scheme(String),
    /// Different host; value is the host.
    External(String),
    /// Path contains `@` (obfuscated addresses, Framer e-mail links).
    EmailLike,
    /// Points at a downloadable file; value is the extension.
    File(String),
    Unparseable,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheme(scheme) => write!(f, "{scheme}: link"),
            Self::External(host) => write!(f, "external origin {host}"),
            Self::EmailLike => f.write_str("e-mail-like path"),
            Self::File(ext) => write!(f, "non-page file (.{ext})"),
            Self::Unparseable => f.write_str("unparseable URL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedLink {
    pub href: String,
    pub reason: String,
}

/// Ordered, deduplicated routes of one site (`/` first, then lexicographic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSet {
    pub origin: Url,
    routes: Vec<Route>,
    excluded: Vec<ExcludedLink>,
}

impl RouteSet {
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn paths(&self) -> impl Iterator<Item = &RoutePath> {
        self.routes.iter().map(|r| &r.path)
    }

    pub fn excluded(&self) -> &[ExcludedLink] {
        &self.excluded
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Build from raw candidates: `(href, base to resolve against, source)`.
    fn collect<'a>(
        origin: &Url,
        candidates: impl IntoIterator<Item = (&'a str, &'a Url, RouteSource)>,
    ) -> Self {
        let mut routes = BTreeMap::new();
        routes.insert(RoutePath::root(), RouteSource::Seed);
        let mut excluded = BTreeMap::new();

        for (href, base, source) in candidates {
            match classify(origin, base, href) {
                Classified::Route(path) => {
                    routes.entry(path).or_insert(source);
                }
                Classified::Excluded(reason) => {
                    excluded
                        .entry(href.trim().to_string())
                        .or_insert_with(|| reason.to_string());
                }
                Classified::Ignored => {}
            }
        }

        Self {
            origin: origin.clone(),
            routes: routes
                .into_iter()
                .map(|(path, source)| Route { path, source })
                .collect(),
            excluded: excluded
                .into_iter()
                .map(|(href, reason)| ExcludedLink { href, reason })
                .collect(),
        }
    }

    /// Route set over known paths, as if found in the DOM.
    #[cfg(test)]
    pub fn from_paths(origin: Url, paths: impl IntoIterator<Item = RoutePath>) -> Self {
        let mut routes: Vec<Route> = paths
            .into_iter()
            .map(|path| Route {
                source: if path.is_root() {
                    RouteSource::Seed
                } else {
                    RouteSource::Dom
                },
                path,
            })
            .collect();
        routes.sort_by(|a, b| a.path.cmp(&b.path));
        routes.dedup_by(|a, b| a.path == b.path);
        Self {
            origin,
            routes,
            excluded: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot reach {url}: {source}")]
    Unreachable {
        url: Url,
        #[source]
        source: BrowserError,
    },
}

// ============================================================================
// Classification
// ============================================================================

/// Outcome of classifying one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Route(RoutePath),
    Excluded(ExclusionReason),
    /// Fragment-only or empty links: the current page, not worth reporting.
    Ignored,
}

/// Classify `href` (as written, entities still escaped) found on `base`.
pub fn classify(origin: &Url, base: &Url, href: &str) -> Classified {
    let href = html::unescape(href.trim());
    if href.is_empty() {
        return Classified::Ignored;
    }

    match LinkKind::parse(&href) {
        LinkKind::Fragment(_) => return Classified::Ignored,
        LinkKind::Scheme(scheme) => {
            return Classified::Excluded(ExclusionReason::Scheme(scheme.to_ascii_lowercase()));
        }
        _ => {}
    }

    let Ok(url) = base.join(&href) else {
        return Classified::Excluded(ExclusionReason::Unparseable);
    };
    if !same_origin(origin, &url) {
        let host = url.host_str().unwrap_or(url.scheme()).to_string();
        return Classified::Excluded(ExclusionReason::External(host));
    }

    let path = decode(url.path());
    if path.contains('@') {
        return Classified::Excluded(ExclusionReason::EmailLike);
    }
    if is_file_path(&path) {
        let ext = path_extension(&path).unwrap_or_default();
        return Classified::Excluded(ExclusionReason::File(ext));
    }

    Classified::Route(RoutePath::from_url(&url))
}

/// Every `<a href>` value in document order (raw, not unescaped).
pub fn extract_links(html: &str) -> Vec<String> {
    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        return Vec::new();
    };
    dom.nodes()
        .iter()
        .filter_map(|node| node.as_tag())
        .filter(|tag| tag.name().as_bytes().eq_ignore_ascii_case(b"a"))
        .filter_map(|tag| html::attr(tag, "href"))
        .map(|href| String::from_utf8_lossy(href).into_owned())
        .collect()
}

// ============================================================================
// Discovery
// ============================================================================

/// Discover the routes of the site at `origin`.
///
/// The homepage must render; the sitemap is optional.
pub async fn discover<R: Renderer>(
    origin: &Url,
    renderer: &R,
    client: &reqwest::Client,
    capture: &CaptureConfig,
) -> Result<RouteSet, DiscoveryError> {
    let viewport = Viewport::new("desktop", capture.width, capture.height);
    let wait = PageWait::for_capture(capture);

    log!("discover"; "rendering {}", origin);
    let html = renderer
        .render(origin, &viewport, &wait)
        .await
        .map_err(|source| DiscoveryError::Unreachable {
            url: origin.clone(),
            source,
        })?;

    let dom_links = extract_links(&html);
    debug!("discover"; "{} on the homepage", plural_count(dom_links.len(), "link"));

    let sitemap_urls = sitemap::fetch_page_urls(client, origin, capture.timeout()).await;
    debug!("discover"; "{} in the sitemap", plural_count(sitemap_urls.len(), "URL"));

    let candidates = dom_links
        .iter()
        .map(|href| (href.as_str(), origin, RouteSource::Dom))
        .chain(
            sitemap_urls
                .iter()
                .map(|loc| (loc.as_str(), origin, RouteSource::Sitemap)),
        );
    let set = RouteSet::collect(origin, candidates);

    log!(
        "discover";
        "{} ({} excluded)",
        plural_count(set.len(), "route"),
        set.excluded().len()
    );
    for link in set.excluded() {
        debug!("discover"; "excluded {} ({})", link.href, link.reason);
    }

    Ok(set)
}
