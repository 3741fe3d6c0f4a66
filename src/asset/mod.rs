//! Asset localization.
//!
//! # Module Structure
//!
//! ```text
//! asset/
//! ├── kind.rs      # Category, buckets
//! ├── scan.rs      # reference spans in HTML, CSS and JS
//! ├── table.rs     # AssetTable (URL -> local path, download once)
//! ├── rewrite.rs   # span splicing, origin audit
//! └── mod.rs       # localize() (this file)
//! ```
//!
//! Reads captured pages, downloads everything they reference into
//! `public/assets/<bucket>/` and writes the rewritten pages to `public/`.
//! Downloaded stylesheets and scripts are scanned the same way, up to
//! `[assets] max_depth` levels.

mod kind;
mod rewrite;
mod scan;
mod table;

pub use kind::Category;
pub use table::{AssetRecord, AssetStatus, AssetTable, Outcome};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use futures::StreamExt;
use url::Url;

use crate::capture::CapturedPage;
use crate::config::{CloneConfig, OutputPaths};
use crate::logger::ProgressLine;
use crate::summary::{Failure, Phase};
use crate::utils::path::{display_relative, recreate_dir, write_file};
use crate::utils::{http, plural_count};
use crate::{debug, log};

use rewrite::{plan_edits, residual_origin, splice};
use scan::{Reference, Target, scan_css, scan_document, scan_js};

/// `assets.json`: records grouped by bucket.
pub type Inventory = BTreeMap<Category, Vec<AssetRecord>>;

/// Result of the localization phase.
#[derive(Debug)]
pub struct LocalizeOutcome {
    pub inventory: Inventory,
    pub failures: Vec<Failure>,
    /// Source-host occurrences left in written pages.
    pub residual: usize,
    pub downloads: usize,
}

/// A downloaded stylesheet or script whose own references need rewriting.
struct TextAsset {
    local: String,
    refs: Vec<Reference>,
}

/// Localize `pages` (in route order) of the site at `origin` into `public/`.
pub async fn localize(
    pages: &[CapturedPage],
    origin: &Url,
    config: &CloneConfig,
) -> Result<LocalizeOutcome> {
    let paths = config.paths();
    let public_dir = paths.public_dir();
    recreate_dir(&public_dir)?;

    let client = http::build_client(&config.capture.user_agent, config.assets.timeout())?;
    let table = AssetTable::new(&config.assets);

    // Plan: documents in route order, references in document order
    let mut documents = Vec::with_capacity(pages.len());
    let mut frontier = Vec::new();
    for page in pages {
        let page_url = page
            .route
            .to_url(origin)
            .with_context(|| format!("invalid route {}", page.route))?;
        let refs = scan_document(&page.html, &page_url, origin);
        register_all(&table, &refs, &mut frontier);
        documents.push((page, refs));
    }
    log!(
        "assets";
        "{} referenced by {}",
        plural_count(table.len(), "asset"),
        plural_count(pages.len(), "page")
    );

    // Fetch level by level; each level's stylesheets and scripts feed the next
    let mut text_assets = Vec::new();
    let mut level = 0;
    while !frontier.is_empty() {
        fetch_level(&table, &client, &frontier, &public_dir, config.assets.concurrency).await;
        if level >= config.assets.max_depth {
            break;
        }

        let mut next = Vec::new();
        for url in &frontier {
            if let Some(asset) = scan_text_asset(&table, url, &public_dir, &mut next) {
                text_assets.push(asset);
            }
        }
        if !next.is_empty() {
            debug!("assets"; "level {}: {} nested", level + 1, plural_count(next.len(), "reference"));
        }
        frontier = next;
        level += 1;
    }

    for asset in &text_assets {
        rewrite_text_asset(&table, asset, &public_dir)?;
    }

    // Rewrite documents
    let mut residual = 0;
    for (page, refs) in &documents {
        let depth = page.route.depth();
        let html = splice(&page.html, &plan_edits(refs, &table, depth));
        let left = residual_origin(&html, origin);
        if left > 0 {
            debug!("assets"; "{} still mentions the source host {} times", page.route, left);
        }
        residual += left;
        write_file(&paths.public_page(&page.route), html)?;
    }
    if residual > 0 {
        log!(
            "warning";
            "{} of {} remain in the bundle",
            plural_count(residual, "reference"),
            origin.host_str().unwrap_or_default()
        );
    }

    let records = table.records();
    let failures: Vec<Failure> = records
        .iter()
        .filter_map(|r| match &r.status {
            AssetStatus::Failed { reason } => {
                Some(Failure::new(Phase::Assets, r.url.as_str(), reason))
            }
            _ => None,
        })
        .collect();

    let inventory = group(records);
    write_inventory(&paths, &inventory)?;
    log_inventory(&inventory, &paths);

    Ok(LocalizeOutcome {
        inventory,
        failures,
        residual,
        downloads: table.download_count(),
    })
}

fn register_all(table: &AssetTable, refs: &[Reference], frontier: &mut Vec<Url>) {
    for r in refs {
        if let Target::Asset { url, hint, .. } = &r.target
            && table.register(url, *hint).is_new
        {
            frontier.push(url.clone());
        }
    }
}

/// Download every URL of one level with bounded concurrency.
async fn fetch_level(
    table: &AssetTable,
    client: &reqwest::Client,
    urls: &[Url],
    public_dir: &Path,
    concurrency: usize,
) {
    let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
    for url in urls {
        if let Some(category) = table.category(url) {
            *counts.entry(category).or_default() += 1;
        }
    }
    let items: Vec<(&'static str, usize)> =
        counts.iter().map(|(c, n)| (c.bucket(), *n)).collect();
    let progress = ProgressLine::new("assets", &items);

    futures::stream::iter(urls)
        .map(|url| {
            let progress = &progress;
            async move {
                let outcome = table.fetch(client, url, public_dir).await;
                let bucket = table.category(url).map_or("", Category::bucket);
                if let Outcome::Failed(reason) = &outcome {
                    debug!("assets"; "failed {}: {}", url, reason);
                    progress.failed(bucket);
                } else {
                    progress.done(bucket);
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<()>>()
        .await;

    progress.finish();
}

/// Scan a downloaded stylesheet or script, registering what it references.
fn scan_text_asset(
    table: &AssetTable,
    url: &Url,
    public_dir: &Path,
    next: &mut Vec<Url>,
) -> Option<TextAsset> {
    let category = table.category(url)?;
    if !category.is_scannable() {
        return None;
    }
    let local = table.local_path(url)?;
    let bytes = fs::read(public_dir.join(&local)).ok()?;
    let text = String::from_utf8_lossy(&bytes);

    let refs = match category {
        Category::Style => scan_css(&text, url),
        _ => scan_js(&text, url),
    };
    if refs.is_empty() {
        return None;
    }
    register_all(table, &refs, next);
    Some(TextAsset { local, refs })
}

fn rewrite_text_asset(table: &AssetTable, asset: &TextAsset, public_dir: &Path) -> Result<()> {
    let path = public_dir.join(&asset.local);
    let bytes = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);

    // `assets/<bucket>/<file>` sits two directories below the root
    let depth = asset.local.matches('/').count();
    let edits = plan_edits(&asset.refs, table, depth);
    if edits.is_empty() {
        return Ok(());
    }
    write_file(&path, splice(&text, &edits))
}

fn group(records: Vec<AssetRecord>) -> Inventory {
    let mut inventory = Inventory::new();
    for record in records {
        inventory.entry(record.category).or_default().push(record);
    }
    for records in inventory.values_mut() {
        records.sort_by(|a, b| a.url.cmp(&b.url));
    }
    inventory
}

pub fn write_inventory(paths: &OutputPaths, inventory: &Inventory) -> Result<()> {
    let json = serde_json::to_string_pretty(inventory)?;
    write_file(&paths.asset_inventory(), json + "\n")
}

/// Read `assets.json`; a missing file is an empty inventory.
pub fn load_inventory(paths: &OutputPaths) -> Result<Inventory> {
    let path = paths.asset_inventory();
    if !path.is_file() {
        return Ok(Inventory::new());
    }
    let content =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Downloaded file count and total bytes of a bucket.
pub fn bucket_totals(records: &[AssetRecord]) -> (usize, u64) {
    records
        .iter()
        .filter(|r| r.status == AssetStatus::Downloaded)
        .fold((0, 0), |(n, bytes), r| (n + 1, bytes + r.size))
}

fn log_inventory(inventory: &Inventory, paths: &OutputPaths) {
    for (category, records) in inventory {
        let (count, bytes) = bucket_totals(records);
        let failed = records
            .iter()
            .filter(|r| matches!(r.status, AssetStatus::Failed { .. }))
            .count();
        let preserved = records
            .iter()
            .filter(|r| r.status == AssetStatus::Preserved)
            .count();

        let mut line = format!(
            "{}: {} ({:.2} MB)",
            category,
            plural_count(count, "file"),
            bytes as f64 / 1024.0 / 1024.0
        );
        if failed > 0 {
            line.push_str(&format!(", {failed} failed"));
        }
        if preserved > 0 {
            line.push_str(&format!(", {preserved} preserved"));
        }
        log!("assets"; "{}", line);
    }
    log!(
        "assets";
        "inventory -> {}",
        display_relative(&paths.asset_inventory(), paths.root())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::core::RoutePath;
    use crate::testing::FixtureServer;
    use tempfile::TempDir;

    fn page(route: &str, html: String) -> CapturedPage {
        CapturedPage {
            route: RoutePath::from_decoded(route),
            html,
            captured_at: 0,
        }
    }

    /// Origin server with one shared font referenced through a stylesheet.
    fn fixture() -> FixtureServer {
        let server = FixtureServer::start();
        server.add("/font.woff2", "font/woff2", b"wOF2".to_vec());
        server.add(
            "/site.css",
            "text/css",
            "@font-face{font-family:I;src:url(/font.woff2)} body{background:url(\"img/bg.png\")}",
        );
        server.add("/img/bg.png", "image/png", b"png".to_vec());
        server.add("/logo.svg", "image/svg+xml", "<svg/>");
        server
    }

    fn doc(origin: &Url, body: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><link rel=\"stylesheet\" href=\"{origin}site.css\">\
             <style>@font-face{{src:url({origin}font.woff2)}}</style></head><body>{body}</body></html>"
        )
    }

    #[tokio::test]
    async fn test_shared_font_downloaded_once_with_correct_depths() {
        let server = fixture();
        let origin = server.url();
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());

        let pages = vec![
            page("/", doc(&origin, "home")),
            page("/about", doc(&origin, "about")),
            page("/blog/post", doc(&origin, "post")),
        ];
        let outcome = localize(&pages, &origin, &config).await.unwrap();

        assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
        assert_eq!(server.hits("/font.woff2"), 1);
        let fonts = dir.path().join("public/assets/fonts");
        assert_eq!(fs::read_dir(&fonts).unwrap().count(), 1);
        assert!(fonts.join("font.woff2").is_file());

        let home = fs::read_to_string(dir.path().join("public/index.html")).unwrap();
        let about = fs::read_to_string(dir.path().join("public/about/index.html")).unwrap();
        let post = fs::read_to_string(dir.path().join("public/blog/post/index.html")).unwrap();
        assert!(home.contains("url(assets/fonts/font.woff2)"));
        assert!(about.contains("url(../assets/fonts/font.woff2)"));
        assert!(post.contains("url(../../assets/fonts/font.woff2)"));
        assert!(post.contains("href=\"../../assets/css/site.css\""));

        // Nested references inside the stylesheet are localized too
        let css = fs::read_to_string(dir.path().join("public/assets/css/site.css")).unwrap();
        assert!(css.contains("url(../../assets/fonts/font.woff2)"));
        assert!(css.contains("url(\"../../assets/images/bg.png\")"));
        assert_eq!(outcome.residual, 0);
    }

    #[tokio::test]
    async fn test_failed_asset_keeps_remote_reference() {
        let server = fixture();
        let origin = server.url();
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());

        let missing = format!("{origin}missing.png");
        let html = format!("<img src=\"{missing}\"><img src=\"{origin}logo.svg\">");
        let pages = vec![page("/", html)];
        let outcome = localize(&pages, &origin, &config).await.unwrap();

        let written = fs::read_to_string(dir.path().join("public/index.html")).unwrap();
        assert!(written.contains(&missing));
        assert!(written.contains("src=\"assets/images/logo.svg\""));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].key, missing);
        assert!(outcome.failures[0].reason.contains("404"));
        assert!(outcome.residual > 0);

        let inventory = load_inventory(&config.paths()).unwrap();
        let images = &inventory[&Category::Image];
        assert_eq!(images.len(), 2);
        assert_eq!(bucket_totals(images), (1, 6));
    }

    #[tokio::test]
    async fn test_absolute_page_links_become_relative() {
        let server = fixture();
        let origin = server.url();
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());

        let html = format!(
            "<a href=\"{origin}about\">A</a><a href=\"/blog/post#c\">P</a><a href=\"./x\">X</a>"
        );
        let pages = vec![page("/blog/post", html)];
        localize(&pages, &origin, &config).await.unwrap();

        let written =
            fs::read_to_string(dir.path().join("public/blog/post/index.html")).unwrap();
        assert_eq!(
            written,
            "<a href=\"../../about\">A</a><a href=\"../../blog/post#c\">P</a><a href=\"./x\">X</a>"
        );
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() {
        let server = fixture();
        let origin = server.url();
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let pages = vec![
            page("/", doc(&origin, "<img src=\"/logo.svg\">")),
            page("/about", doc(&origin, "about")),
        ];

        localize(&pages, &origin, &config).await.unwrap();
        let first = fs::read_to_string(dir.path().join("public/about/index.html")).unwrap();
        let first_inventory = fs::read_to_string(dir.path().join("assets.json")).unwrap();

        // Stale files from the previous run must not survive
        fs::write(dir.path().join("public/stale.txt"), "x").unwrap();
        localize(&pages, &origin, &config).await.unwrap();

        let second = fs::read_to_string(dir.path().join("public/about/index.html")).unwrap();
        let second_inventory = fs::read_to_string(dir.path().join("assets.json")).unwrap();
        assert_eq!(first, second);
        assert_eq!(first_inventory, second_inventory);
        assert!(!dir.path().join("public/stale.txt").exists());
    }
}
