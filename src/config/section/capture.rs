//! `[capture]` section configuration.
//!
//! Shared by route discovery and page capture: both drive the same headless
//! browser with the same patience settings.
//!
//! ```toml
//! [capture]
//! settle_ms = 5000          # fixed delay after network idle
//! idle_ms = 500             # quiet window that counts as "network idle"
//! timeout_secs = 60         # per-route navigation + render budget
//! image_wait_secs = 10      # max wait for <img> elements to finish loading
//! width = 1920
//! height = 1080
//! # chrome_path = "/usr/bin/chromium"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

/// Desktop Chrome on macOS; Framer serves the full desktop breakpoint to it.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub settle_ms: u64,
    pub idle_ms: u64,
    pub timeout_secs: u64,
    pub image_wait_secs: u64,
    pub user_agent: String,
    pub width: u32,
    pub height: u32,

    /// Browser executable; auto-detected when unset.
    pub chrome_path: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            settle_ms: 5000,
            idle_ms: 500,
            timeout_secs: 60,
            image_wait_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            width: 1920,
            height: 1080,
            chrome_path: None,
        }
    }
}

impl CaptureConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.timeout_secs == 0 {
            diag.error("capture.timeout_secs", "timeout must be positive");
        }
        if self.width == 0 || self.height == 0 {
            diag.error("capture.width", "viewport dimensions must be positive");
        }
        if self.settle_ms / 1000 >= self.timeout_secs {
            diag.error_with_hint(
                "capture.settle_ms",
                "settle delay exceeds the route timeout",
                "raise capture.timeout_secs or lower capture.settle_ms",
            );
        }
        if let Some(path) = &self.chrome_path
            && !path.exists()
        {
            diag.error(
                "capture.chrome_path",
                format!("browser not found at {}", path.display()),
            );
        }
    }
}
