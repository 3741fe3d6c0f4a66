//! `[parity]` section configuration.
//!
//! ```toml
//! [parity]
//! enable = true
//! threshold = 5.0            # LAB ΔE above which a pixel differs
//! timeout_secs = 60
//! settle_ms = 5000
//!
//! [[parity.viewports]]
//! name = "desktop"
//! width = 1920
//! height = 1080
//!
//! [[parity.viewports]]
//! name = "mobile"
//! width = 375
//! height = 667
//! mobile = true
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::Viewport;
use crate::config::ConfigDiagnostics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParityConfig {
    /// Run the verifier as part of `clone`.
    pub enable: bool,
    pub threshold: f32,
    pub timeout_secs: u64,
    pub settle_ms: u64,
    pub viewports: Vec<Viewport>,
}

impl Default for ParityConfig {
    fn default() -> Self {
        Self {
            enable: true,
            threshold: 5.0,
            timeout_secs: 60,
            settle_ms: 5000,
            viewports: vec![Viewport::desktop(), Viewport::mobile()],
        }
    }
}

impl ParityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !(0.0..=100.0).contains(&self.threshold) {
            diag.error_with_hint(
                "parity.threshold",
                format!("threshold {} is outside 0..=100", self.threshold),
                "ΔE 2.3 is a just-noticeable difference; the default is 5.0",
            );
        }
        if self.timeout_secs == 0 {
            diag.error("parity.timeout_secs", "timeout must be positive");
        }
        if self.viewports.is_empty() {
            diag.error_with_hint(
                "parity.viewports",
                "no viewports configured",
                "remove the section to use desktop and mobile",
            );
        }

        let mut seen = std::collections::BTreeSet::new();
        for (i, vp) in self.viewports.iter().enumerate() {
            if vp.width == 0 || vp.height == 0 {
                diag.error(
                    format!("parity.viewports[{i}]"),
                    format!("viewport `{}` has a zero dimension", vp.name),
                );
            }
            let valid_name = !vp.name.is_empty()
                && vp
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
            if !valid_name {
                diag.error(
                    format!("parity.viewports[{i}].name"),
                    format!("`{}` is not a valid file name", vp.name),
                );
            }
            if !seen.insert(vp.name.as_str()) {
                diag.error(
                    format!("parity.viewports[{i}].name"),
                    format!("duplicate viewport `{}`", vp.name),
                );
            }
        }
    }
}
