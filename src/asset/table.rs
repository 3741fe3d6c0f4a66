//! The asset table: one record per remote URL for the whole run.
//!
//! Registration assigns each URL its category and a unique local path under
//! `assets/<bucket>/`. Downloads go through a per-URL [`OnceCell`], so however
//! many documents or concurrent tasks reference a URL it is fetched at most
//! once and every caller observes the same outcome.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use url::Url;

use super::Category;
use super::scan::url_extension;
use crate::config::AssetsConfig;
use crate::core::decode;
use crate::debug;
use crate::utils::hash::fingerprint_n;
use crate::utils::http;
use crate::utils::path::write_file;

/// Longest file name kept from a URL before falling back to a fingerprint.
const MAX_NAME_LEN: usize = 100;

/// Delay unit between attempts (attempt `n` waits `n` units).
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// State of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AssetStatus {
    Pending,
    Downloaded,
    Failed { reason: String },
    /// Allow-listed host, kept remote.
    Preserved,
}

/// Snapshot of a record, as written to `assets.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub url: String,
    pub category: Category,
    /// Relative to the bundle root, e.g. `assets/fonts/inter.woff2`.
    pub local: Option<String>,
    pub size: u64,
    pub content_type: Option<String>,
    #[serde(flatten)]
    pub status: AssetStatus,
}

/// Final result of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Downloaded {
        size: u64,
        content_type: Option<String>,
    },
    Failed(String),
    Preserved,
}

struct Slot {
    category: Category,
    local: Option<String>,
    outcome: OnceCell<Outcome>,
}

/// Registered URL as seen by the planner.
#[derive(Debug, Clone)]
pub struct Registered {
    pub category: Category,
    pub local: Option<String>,
    /// First registration of this URL.
    pub is_new: bool,
}

pub struct AssetTable {
    slots: DashMap<Url, Arc<Slot>, FxBuildHasher>,
    /// Local path -> owning URL; guarantees the mapping is injective.
    claimed: DashMap<String, Url, FxBuildHasher>,
    /// Registration order, for deterministic iteration.
    order: Mutex<Vec<Url>>,
    config: AssetsConfig,
    downloads: AtomicUsize,
}

impl AssetTable {
    pub fn new(config: &AssetsConfig) -> Self {
        Self {
            slots: DashMap::with_hasher(FxBuildHasher),
            claimed: DashMap::with_hasher(FxBuildHasher),
            order: Mutex::new(Vec::new()),
            config: config.clone(),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Register `url` (without fragment), classifying and naming it on first sight.
    pub fn register(&self, url: &Url, hint: Category) -> Registered {
        match self.slots.entry(url.clone()) {
            Entry::Occupied(entry) => Registered {
                category: entry.get().category,
                local: entry.get().local.clone(),
                is_new: false,
            },
            Entry::Vacant(entry) => {
                let category = Category::classify(url_extension(url).as_deref(), hint);
                let preserved = url
                    .host_str()
                    .is_some_and(|host| self.config.is_preserved(host));
                let local = (!preserved).then(|| self.claim_path(url, category));

                let outcome = OnceCell::new();
                if preserved {
                    let _ = outcome.set(Outcome::Preserved);
                }
                entry.insert(Arc::new(Slot {
                    category,
                    local: local.clone(),
                    outcome,
                }));
                self.order.lock().push(url.clone());

                Registered {
                    category,
                    local,
                    is_new: true,
                }
            }
        }
    }

    /// Claim a unique `assets/<bucket>/<file>` path for `url`.
    fn claim_path(&self, url: &Url, category: Category) -> String {
        let file = file_name(url, category);
        let (stem, ext) = match file.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
            None => (file.clone(), String::new()),
        };

        let mut candidate = format!("assets/{}/{}", category.bucket(), file);
        // Same name within a bucket: suffix a URL fingerprint, longer on repeat
        for len in [8, 16, 32, 64] {
            match self.claimed.entry(candidate.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(url.clone());
                    return candidate;
                }
                Entry::Occupied(_) => {
                    candidate = format!(
                        "assets/{}/{}-{}{}",
                        category.bucket(),
                        stem,
                        fingerprint_n(url.as_str(), len),
                        ext
                    );
                }
            }
        }
        self.claimed.insert(candidate.clone(), url.clone());
        candidate
    }

    /// Download `url` into `public_dir` once; later calls return the stored outcome.
    pub async fn fetch(&self, client: &reqwest::Client, url: &Url, public_dir: &Path) -> Outcome {
        let Some(slot) = self.slots.get(url).map(|s| Arc::clone(s.value())) else {
            return Outcome::Failed("not registered".to_string());
        };
        let Some(local) = slot.local.as_deref() else {
            return Outcome::Preserved;
        };
        let target = public_dir.join(local);

        slot.outcome
            .get_or_init(|| async {
                self.downloads.fetch_add(1, Ordering::Relaxed);
                self.download(client, url, &target).await
            })
            .await
            .clone()
    }

    async fn download(&self, client: &reqwest::Client, url: &Url, target: &Path) -> Outcome {
        let attempts = self.config.retries + 1;
        let mut attempt = 1;
        loop {
            match http::get(client, url, self.config.timeout()).await {
                Ok(fetched) => {
                    if let Err(e) = write_file(target, &fetched.bytes) {
                        return Outcome::Failed(format!("{e:#}"));
                    }
                    return Outcome::Downloaded {
                        size: fetched.bytes.len() as u64,
                        content_type: fetched.content_type,
                    };
                }
                Err(e) if e.is_permanent() || attempt >= attempts => {
                    return Outcome::Failed(e.to_string());
                }
                Err(e) => {
                    debug!("assets"; "retrying {} ({}), attempt {}/{}", url, e, attempt + 1, attempts);
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    pub fn category(&self, url: &Url) -> Option<Category> {
        self.slots.get(url).map(|slot| slot.category)
    }

    /// Local path of a successfully downloaded URL.
    pub fn local_path(&self, url: &Url) -> Option<String> {
        let slot = self.slots.get(url)?;
        match slot.outcome.get() {
            Some(Outcome::Downloaded { .. }) => slot.local.clone(),
            _ => None,
        }
    }

    /// Number of network downloads actually started.
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Snapshot of every record, in registration order.
    pub fn records(&self) -> Vec<AssetRecord> {
        let order = self.order.lock().clone();
        order
            .iter()
            .filter_map(|url| {
                let slot = self.slots.get(url)?;
                let (status, size, content_type) = match slot.outcome.get() {
                    None => (AssetStatus::Pending, 0, None),
                    Some(Outcome::Downloaded { size, content_type }) => {
                        (AssetStatus::Downloaded, *size, content_type.clone())
                    }
                    Some(Outcome::Failed(reason)) => (
                        AssetStatus::Failed {
                            reason: reason.clone(),
                        },
                        0,
                        None,
                    ),
                    Some(Outcome::Preserved) => (AssetStatus::Preserved, 0, None),
                };
                Some(AssetRecord {
                    url: url.to_string(),
                    category: slot.category,
                    local: slot.local.clone(),
                    size,
                    content_type,
                    status,
                })
            })
            .collect()
    }
}

/// File name for `url`: its last path segment when usable, else a fingerprint
/// with the category's default extension.
fn file_name(url: &Url, category: Category) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(decode)
        .unwrap_or_default();
    let sanitized: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');

    let (stem, ext) = sanitized.rsplit_once('.').unwrap_or((sanitized, ""));
    if stem.is_empty() || ext.is_empty() || sanitized.len() > MAX_NAME_LEN {
        return format!(
            "{}.{}",
            fingerprint_n(url.as_str(), 12),
            category.default_extension()
        );
    }
    sanitized.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixtureServer;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn table() -> AssetTable {
        AssetTable::new(&AssetsConfig {
            retries: 0,
            timeout_secs: 2,
            ..AssetsConfig::default()
        })
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_file_name_rules() {
        assert_eq!(
            file_name(&url("https://cdn.com/fonts/Inter.woff2?v=3"), Category::Font),
            "Inter.woff2"
        );
        assert_eq!(
            file_name(&url("https://cdn.com/a%20b.png"), Category::Image),
            "a-b.png"
        );
        let hashed = file_name(&url("https://cdn.com/images/abc"), Category::Image);
        assert_eq!(hashed.len(), 12 + ".png".len());
        assert!(hashed.ends_with(".png"));
        let long = format!("https://cdn.com/{}.js", "x".repeat(120));
        assert!(file_name(&url(&long), Category::Script).ends_with(".js"));
        assert_eq!(file_name(&url(&long), Category::Script).len(), 15);
    }

    #[test]
    fn test_register_is_idempotent() {
        let table = table();
        let first = table.register(&url("https://cdn.com/a.png"), Category::Image);
        let again = table.register(&url("https://cdn.com/a.png"), Category::Script);
        assert!(first.is_new);
        assert!(!again.is_new);
        assert_eq!(first.local, again.local);
        assert_eq!(again.category, Category::Image);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_mapping_is_injective() {
        let table = table();
        let urls = [
            "https://framerusercontent.com/images/x.png",
            "https://framerusercontent.com/images/x.png?scale-down-to=512",
            "https://other.com/x.png",
            "https://other.com/x.woff2",
            "https://cdn.com/x",
        ];
        let locals: Vec<_> = urls
            .iter()
            .map(|u| table.register(&url(u), Category::Image).local.unwrap())
            .collect();
        let unique: HashSet<_> = locals.iter().collect();
        assert_eq!(unique.len(), urls.len());
        assert_eq!(locals[0], "assets/images/x.png");
        assert!(locals[1].starts_with("assets/images/x-"));
        assert_eq!(locals[3], "assets/fonts/x.woff2");
    }

    #[test]
    fn test_naming_is_deterministic() {
        let a = table();
        let b = table();
        for u in ["https://a.com/x.png", "https://b.com/x.png"] {
            assert_eq!(
                a.register(&url(u), Category::Image).local,
                b.register(&url(u), Category::Image).local
            );
        }
    }

    #[test]
    fn test_preserved_hosts_are_not_named() {
        let table = AssetTable::new(&AssetsConfig {
            preserve_hosts: vec!["googletagmanager.com".into()],
            ..AssetsConfig::default()
        });
        let reg = table.register(
            &url("https://www.googletagmanager.com/gtm.js"),
            Category::Script,
        );
        assert!(reg.local.is_none());
        assert_eq!(table.records()[0].status, AssetStatus::Preserved);
    }

    #[tokio::test]
    async fn test_concurrent_fetch_downloads_once() {
        let server = FixtureServer::start();
        server.add("/font.woff2", "font/woff2", b"wOF2data".to_vec());
        let dir = TempDir::new().unwrap();
        let table = table();
        let client = reqwest::Client::new();
        let font = server.url().join("font.woff2").unwrap();
        table.register(&font, Category::Image);

        let outcomes = futures::future::join_all(
            (0..8).map(|_| table.fetch(&client, &font, dir.path())),
        )
        .await;

        assert!(outcomes.iter().all(|o| matches!(o, Outcome::Downloaded { size: 8, .. })));
        assert_eq!(server.hits("/font.woff2"), 1);
        assert_eq!(table.download_count(), 1);
        assert!(dir.path().join("assets/fonts/font.woff2").is_file());
        assert_eq!(
            table.local_path(&font).as_deref(),
            Some("assets/fonts/font.woff2")
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_is_recorded() {
        let server = FixtureServer::start();
        let dir = TempDir::new().unwrap();
        let table = table();
        let client = reqwest::Client::new();
        let missing = server.url().join("missing.png").unwrap();
        table.register(&missing, Category::Image);

        let outcome = table.fetch(&client, &missing, dir.path()).await;
        assert_eq!(outcome, Outcome::Failed("HTTP 404".to_string()));
        assert!(table.local_path(&missing).is_none());
        assert!(matches!(
            &table.records()[0].status,
            AssetStatus::Failed { reason } if reason == "HTTP 404"
        ));
    }

    #[test]
    fn test_record_json_shape() {
        let record = AssetRecord {
            url: "https://cdn.com/a.png".into(),
            category: Category::Image,
            local: Some("assets/images/a.png".into()),
            size: 10,
            content_type: Some("image/png".into()),
            status: AssetStatus::Failed {
                reason: "HTTP 500".into(),
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["reason"], "HTTP 500");
        assert_eq!(value["category"], "images");
        let back: AssetRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
