//! Output directory layout.
//!
//! Every file the pipeline writes is named here, so phases that communicate
//! through the filesystem (`localize` reading a capture, `verify` reading a
//! bundle) agree on locations.

use std::path::{Path, PathBuf};

use crate::core::RoutePath;

/// Resolves paths under the output root.
#[derive(Debug, Clone, Copy)]
pub struct OutputPaths<'a> {
    root: &'a Path,
}

impl<'a> OutputPaths<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        self.root
    }

    // ------------------------------------------------------------------------
    // capture
    // ------------------------------------------------------------------------

    pub fn capture_dir(&self) -> PathBuf {
        self.root.join("capture")
    }

    pub fn capture_manifest(&self) -> PathBuf {
        self.capture_dir().join("manifest.json")
    }

    pub fn captured_page(&self, route: &RoutePath) -> PathBuf {
        route.index_file(&self.capture_dir())
    }

    // ------------------------------------------------------------------------
    // bundle
    // ------------------------------------------------------------------------

    pub fn public_dir(&self) -> PathBuf {
        self.root.join("public")
    }

    pub fn public_page(&self, route: &RoutePath) -> PathBuf {
        route.index_file(&self.public_dir())
    }

    pub fn asset_inventory(&self) -> PathBuf {
        self.root.join("assets.json")
    }

    pub fn summary(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    // ------------------------------------------------------------------------
    // deploy
    // ------------------------------------------------------------------------

    pub fn vercel_json(&self) -> PathBuf {
        self.root.join("vercel.json")
    }

    pub fn serve_sh(&self) -> PathBuf {
        self.root.join("serve.sh")
    }

    pub fn readme(&self) -> PathBuf {
        self.root.join("README.md")
    }

    // ------------------------------------------------------------------------
    // parity
    // ------------------------------------------------------------------------

    pub fn parity_dir(&self) -> PathBuf {
        self.root.join("parity")
    }

    /// `parity/screenshots/<route>/<viewport>/`
    pub fn screenshot_dir(&self, route: &RoutePath, viewport: &str) -> PathBuf {
        self.parity_dir()
            .join("screenshots")
            .join(route.safe_name())
            .join(viewport)
    }

    /// `parity/diffs/<route>/<viewport>_diff.png`
    pub fn diff_image(&self, route: &RoutePath, viewport: &str) -> PathBuf {
        self.parity_dir()
            .join("diffs")
            .join(route.safe_name())
            .join(format!("{viewport}_diff.png"))
    }

    pub fn parity_results(&self) -> PathBuf {
        self.parity_dir().join("parity_results.json")
    }

    pub fn parity_report(&self) -> PathBuf {
        self.root.join("PARITY_REPORT.md")
    }
}
