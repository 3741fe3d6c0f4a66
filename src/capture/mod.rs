//! Page capture.
//!
//! Renders every discovered route in the browser and stores the serialized DOM
//! under `capture/`. A route that fails or times out is recorded and skipped;
//! the remaining routes are still captured.

use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::browser::{PageWait, Renderer, Viewport};
use crate::config::{CloneConfig, OutputPaths};
use crate::core::RoutePath;
use crate::discover::RouteSet;
use crate::summary::{Failure, Phase};
use crate::utils::path::{display_relative, recreate_dir, write_file};
use crate::utils::plural_count;
use crate::{debug, log};

/// Rendered HTML of one route.
#[derive(Debug, Clone)]
pub struct CapturedPage {
    pub route: RoutePath,
    pub html: String,
    /// Unix seconds.
    pub captured_at: u64,
}

/// Entry of `capture/manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPage {
    pub route: RoutePath,
    /// Relative to the capture directory.
    pub file: String,
    pub bytes: usize,
    pub captured_at: u64,
}

/// `capture/manifest.json`: what a later `localize` needs to resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureManifest {
    pub source: Url,
    pub routes: Vec<RoutePath>,
    pub pages: Vec<ManifestPage>,
    pub failed: Vec<Failure>,
}

impl CaptureManifest {
    pub fn load(paths: &OutputPaths) -> Result<Self> {
        let path = paths.capture_manifest();
        let content = fs::read_to_string(&path).with_context(|| {
            format!(
                "no capture found at {} (run `clone` first)",
                path.display()
            )
        })?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Read back every captured page, in route order.
    pub fn read_pages(&self, paths: &OutputPaths) -> Result<Vec<CapturedPage>> {
        let mut pages: Vec<CapturedPage> = self
            .pages
            .iter()
            .map(|entry| {
                let file = paths.captured_page(&entry.route);
                let html = fs::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?;
                Ok(CapturedPage {
                    route: entry.route.clone(),
                    html,
                    captured_at: entry.captured_at,
                })
            })
            .collect::<Result<_>>()?;
        pages.sort_by(|a, b| a.route.cmp(&b.route));
        Ok(pages)
    }
}

/// Result of the capture phase.
#[derive(Debug)]
pub struct CaptureOutcome {
    pub pages: Vec<CapturedPage>,
    pub failures: Vec<Failure>,
}

/// Render every route and write `capture/`.
///
/// The capture directory is recreated so stale pages from an earlier run with
/// a different route set never leak into the bundle.
pub async fn capture<R: Renderer>(
    routes: &RouteSet,
    renderer: &R,
    config: &CloneConfig,
) -> Result<CaptureOutcome> {
    let paths = config.paths();
    let capture = &config.capture;
    let viewport = Viewport::new("desktop", capture.width, capture.height);
    let wait = PageWait::for_capture(capture);

    recreate_dir(&paths.capture_dir())?;
    log!("capture"; "rendering {}", plural_count(routes.len(), "route"));

    let mut pages = Vec::with_capacity(routes.len());
    let mut failures = Vec::new();

    for (i, route) in routes.paths().enumerate() {
        let url = match route.to_url(&routes.origin) {
            Ok(url) => url,
            Err(e) => {
                failures.push(Failure::new(Phase::Capture, route.as_str(), e));
                continue;
            }
        };

        debug!("capture"; "[{}/{}] {}", i + 1, routes.len(), url);
        match renderer.render(&url, &viewport, &wait).await {
            Ok(html) => {
                let file = paths.captured_page(route);
                write_file(&file, &html)?;
                log!(
                    "capture";
                    "{} -> {} ({} KB)",
                    route,
                    display_relative(&file, paths.root()),
                    html.len() / 1024
                );
                pages.push(CapturedPage {
                    route: route.clone(),
                    html,
                    captured_at: unix_now(),
                });
            }
            Err(e) => {
                log!("error"; "failed to capture {}: {}", route, e);
                failures.push(Failure::new(Phase::Capture, route.as_str(), e));
            }
        }
    }

    write_manifest(&paths, routes, &pages, &failures)?;
    log!(
        "capture";
        "captured {} of {}",
        pages.len(),
        plural_count(routes.len(), "route")
    );

    Ok(CaptureOutcome { pages, failures })
}

fn write_manifest(
    paths: &OutputPaths,
    routes: &RouteSet,
    pages: &[CapturedPage],
    failed: &[Failure],
) -> Result<()> {
    let capture_dir = paths.capture_dir();
    let manifest = CaptureManifest {
        source: routes.origin.clone(),
        routes: routes.paths().cloned().collect(),
        pages: pages
            .iter()
            .map(|page| ManifestPage {
                route: page.route.clone(),
                file: display_relative(&paths.captured_page(&page.route), &capture_dir),
                bytes: page.html.len(),
                captured_at: page.captured_at,
            })
            .collect(),
        failed: failed.to_vec(),
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    write_file(&paths.capture_manifest(), json + "\n")
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::testing::{FakeRenderer, Scripted};
    use tempfile::TempDir;

    fn site() -> Url {
        Url::parse("https://site.framer.website/").unwrap()
    }

    fn route_set(paths: &[&str]) -> RouteSet {
        RouteSet::from_paths(site(), paths.iter().map(|p| RoutePath::from_decoded(p)))
    }

    #[tokio::test]
    async fn test_capture_writes_index_files() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let renderer = FakeRenderer::new();
        renderer.page(&site(), "<!DOCTYPE html><html>home</html>");
        renderer.page(
            &site().join("/blog/post").unwrap(),
            "<!DOCTYPE html><html>post</html>",
        );

        let outcome = capture(&route_set(&["/", "/blog/post"]), &renderer, &config)
            .await
            .unwrap();

        assert_eq!(outcome.pages.len(), 2);
        assert!(outcome.failures.is_empty());
        let home = fs::read_to_string(dir.path().join("capture/index.html")).unwrap();
        assert!(home.contains("home"));
        let post = fs::read_to_string(dir.path().join("capture/blog/post/index.html")).unwrap();
        assert!(post.contains("post"));
    }

    #[tokio::test]
    async fn test_one_timeout_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.capture.timeout_secs = 1;

        let renderer = FakeRenderer::new();
        renderer.page(&site(), "<html>home</html>");
        renderer.on(site().join("/slow").unwrap().as_str(), Scripted::Hang);
        renderer.page(&site().join("/zeta").unwrap(), "<html>zeta</html>");

        let routes = route_set(&["/", "/slow", "/zeta"]);
        let outcome = capture(&routes, &renderer, &config).await.unwrap();

        let captured: Vec<_> = outcome.pages.iter().map(|p| p.route.as_str()).collect();
        assert_eq!(captured, vec!["/", "/zeta"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].key, "/slow");
        assert!(outcome.failures[0].reason.contains("timed out"));
        assert!(dir.path().join("capture/zeta/index.html").is_file());
        assert!(!dir.path().join("capture/slow/index.html").exists());

        // The timed-out route's tab was closed too
        let tabs = renderer.tabs();
        assert_eq!(tabs.opened, 3);
        assert_eq!(tabs.closed, 3);
    }

    #[tokio::test]
    async fn test_manifest_roundtrip_for_localize() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let renderer = FakeRenderer::new();
        renderer.page(&site(), "<html>home</html>");
        renderer.on(
            site().join("/broken").unwrap().as_str(),
            Scripted::Fail("net::ERR_ABORTED".into()),
        );

        capture(&route_set(&["/", "/broken"]), &renderer, &config)
            .await
            .unwrap();

        let paths = config.paths();
        let manifest = CaptureManifest::load(&paths).unwrap();
        assert_eq!(manifest.source, site());
        assert_eq!(manifest.routes.len(), 2);
        assert_eq!(manifest.pages.len(), 1);
        assert_eq!(manifest.pages[0].file, "index.html");
        assert_eq!(manifest.failed[0].key, "/broken");

        let pages = manifest.read_pages(&paths).unwrap();
        assert_eq!(pages[0].html, "<html>home</html>");
    }

    #[test]
    fn test_missing_manifest_is_error() {
        let dir = TempDir::new().unwrap();
        let paths = OutputPaths::new(dir.path());
        let err = CaptureManifest::load(&paths).unwrap_err();
        assert!(err.to_string().contains("no capture found"));
    }
}
