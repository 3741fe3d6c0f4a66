//! `[deploy]` section configuration.
//!
//! Controls the generated `vercel.json` and `README.md`.
//!
//! ```toml
//! [deploy]
//! cache_max_age = 31536000   # seconds, for fonts/images/scripts
//! readme = true              # write README.md next to the bundle
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

/// One year, the conventional value for fingerprinted immutable assets.
pub const DEFAULT_CACHE_MAX_AGE: u64 = 31_536_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// `max-age` for immutable asset buckets.
    pub cache_max_age: u64,

    /// Write README.md with run and deploy instructions.
    pub readme: bool,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            readme: true,
        }
    }
}

impl DeployConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.cache_max_age == 0 {
            diag.error_with_hint(
                "deploy.cache_max_age",
                "cache max-age must be positive",
                "remove the field to use one year",
            );
        }
    }
}
