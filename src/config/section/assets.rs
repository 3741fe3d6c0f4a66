//! `[assets]` section configuration.
//!
//! ```toml
//! [assets]
//! concurrency = 8            # parallel downloads
//! retries = 2                # extra attempts per asset, linear backoff
//! timeout_secs = 30          # per attempt
//! max_depth = 4              # CSS/JS reference scanning depth
//! preserve_hosts = ["www.googletagmanager.com"]
//! strict = false             # exit non-zero when any asset failed
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub concurrency: usize,
    pub retries: u32,
    pub timeout_secs: u64,
    pub max_depth: usize,

    /// Hosts whose references are kept remote and recorded as preserved.
    pub preserve_hosts: Vec<String>,

    /// Treat any failed asset as a run failure.
    pub strict: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            retries: 2,
            timeout_secs: 30,
            max_depth: 4,
            preserve_hosts: Vec::new(),
            strict: false,
        }
    }
}

impl AssetsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether `host` is allow-listed (exact match or subdomain).
    pub fn is_preserved(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.preserve_hosts.iter().any(|h| {
            let h = h.to_ascii_lowercase();
            host == h || host.ends_with(&format!(".{h}"))
        })
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.concurrency == 0 {
            diag.error_with_hint(
                "assets.concurrency",
                "concurrency must be at least 1",
                "the default is 8",
            );
        }
        if self.timeout_secs == 0 {
            diag.error("assets.timeout_secs", "timeout must be positive");
        }
        for (i, host) in self.preserve_hosts.iter().enumerate() {
            if host.is_empty() || host.contains('/') {
                diag.error_with_hint(
                    format!("assets.preserve_hosts[{i}]"),
                    format!("`{host}` is not a host name"),
                    "use a bare host such as `fonts.gstatic.com`",
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ConfigDiagnostics, test_parse_config};

    #[test]
    fn test_assets_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.assets.concurrency, 8);
        assert_eq!(config.assets.retries, 2);
        assert_eq!(config.assets.max_depth, 4);
        assert!(!config.assets.strict);
    }

    #[test]
    fn test_preserved_hosts_match_subdomains() {
        let config = test_parse_config("[assets]\npreserve_hosts = [\"gstatic.com\"]");
        assert!(config.assets.is_preserved("gstatic.com"));
        assert!(config.assets.is_preserved("Fonts.GStatic.com"));
        assert!(!config.assets.is_preserved("notgstatic.com"));
    }

    #[test]
    fn test_assets_validation() {
        let config = test_parse_config(
            "[assets]\nconcurrency = 0\npreserve_hosts = [\"https://x.com/\"]",
        );
        let mut diag = ConfigDiagnostics::new();
        config.assets.validate(&mut diag);
        assert_eq!(diag.len(), 2);
    }
}
