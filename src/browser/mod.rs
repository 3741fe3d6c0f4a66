//! Headless browser abstraction.
//!
//! Discovery, capture and parity only need two things from a browser: the
//! serialized DOM of a fully rendered page, and a full-page PNG. The
//! [`Renderer`] trait is that seam; [`ChromeRenderer`] drives Chromium over
//! CDP and tests substitute scripted fakes.

mod chrome;

pub use chrome::ChromeRenderer;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::{CaptureConfig, ParityConfig};

// ============================================================================
// Types
// ============================================================================

/// Named viewport preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Emulate a touch device (mobile breakpoints, no scrollbars).
    #[serde(default)]
    pub mobile: bool,
}

impl Viewport {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            mobile: false,
        }
    }

    pub fn desktop() -> Self {
        Self::new("desktop", 1920, 1080)
    }

    pub fn mobile() -> Self {
        Self {
            mobile: true,
            ..Self::new("mobile", 375, 667)
        }
    }
}

/// How long to wait for a page before reading it.
#[derive(Debug, Clone, Copy)]
pub struct PageWait {
    /// Hard bound on one render or screenshot, tab setup included.
    pub limit: Duration,
    /// Quiet window with no new resource entries that counts as network idle.
    pub idle: Duration,
    /// Upper bound on the idle wait; continuous pollers never go quiet.
    pub idle_budget: Duration,
    /// Fixed delay after idle, for entrance animations.
    pub settle: Duration,
    /// Upper bound on waiting for `<img>` elements to complete.
    pub image_wait: Duration,
}

impl PageWait {
    pub fn for_capture(capture: &CaptureConfig) -> Self {
        Self {
            limit: capture.timeout(),
            idle: Duration::from_millis(capture.idle_ms),
            idle_budget: capture.timeout() / 2,
            settle: capture.settle(),
            image_wait: Duration::from_secs(capture.image_wait_secs),
        }
    }

    pub fn for_parity(parity: &ParityConfig, capture: &CaptureConfig) -> Self {
        Self {
            limit: parity.timeout(),
            idle: Duration::from_millis(capture.idle_ms),
            idle_budget: parity.timeout() / 2,
            settle: Duration::from_millis(parity.settle_ms),
            image_wait: Duration::from_secs(capture.image_wait_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("page script returned unexpected data: {0}")]
    Script(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::Protocol(err.to_string())
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Something that can load a URL like a real browser.
///
/// Both calls are bounded by `wait.limit` and fail with
/// [`BrowserError::Timeout`] on expiry. The bound is enforced by the renderer,
/// not the caller, so a page opened for the call is released on every path.
pub trait Renderer {
    /// Navigate, wait for the page to settle and return `document.documentElement.outerHTML`.
    fn render(
        &self,
        url: &Url,
        viewport: &Viewport,
        wait: &PageWait,
    ) -> impl Future<Output = Result<String, BrowserError>>;

    /// Navigate, wait for the page to settle and return a full-page PNG.
    fn screenshot(
        &self,
        url: &Url,
        viewport: &Viewport,
        wait: &PageWait,
    ) -> impl Future<Output = Result<Vec<u8>, BrowserError>>;
}

/// Bound `fut` by `limit`, mapping expiry to [`BrowserError::Timeout`].
pub async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, BrowserError>>,
) -> Result<T, BrowserError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| BrowserError::Timeout(limit))?
}
