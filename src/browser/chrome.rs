//! Chromium over the DevTools protocol.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use super::{BrowserError, PageWait, Renderer, Viewport, with_timeout};
use crate::{config::CaptureConfig, debug};

/// Interval between readiness probes.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Document readiness plus the number of resource timing entries so far.
/// A count that stops growing for the idle window means the network is quiet.
const IDLE_PROBE: &str = "JSON.stringify({ \
     ready: document.readyState, \
     resources: performance.getEntriesByType('resource').length })";

const IMAGES_PROBE: &str =
    "JSON.stringify(Array.from(document.images).every(img => img.complete))";

#[derive(Debug, Deserialize)]
struct IdleProbe {
    ready: String,
    resources: usize,
}

/// One headless Chromium process shared by every page of a phase.
pub struct ChromeRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    user_agent: String,
}

impl ChromeRenderer {
    /// Launch the browser (auto-detected unless `capture.chrome_path` is set).
    pub async fn launch(capture: &CaptureConfig) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .window_size(capture.width, capture.height)
            .request_timeout(capture.timeout())
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--hide-scrollbars")
            .arg("--mute-audio");

        if let Some(path) = &capture.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(BrowserError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser"; "handler error: {e}");
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            user_agent: capture.user_agent.clone(),
        })
    }

    /// Close the browser process and stop the event loop.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("browser"; "close failed: {e}");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }

    /// Fresh tab with the viewport and user agent applied.
    async fn open(&self, viewport: &Viewport) -> Result<Page, BrowserError> {
        let page = self.browser.new_page("about:blank").await?;
        page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(viewport.width),
            i64::from(viewport.height),
            1.0,
            viewport.mobile,
        ))
        .await?;
        Ok(page)
    }

    /// Open a tab, load `url` and `read` it within `wait.limit`.
    ///
    /// The tab is closed whether `read` succeeds, fails or runs out of time.
    async fn in_tab<T>(
        &self,
        url: &Url,
        viewport: &Viewport,
        wait: &PageWait,
        read: impl AsyncFnOnce(&Page) -> Result<T, BrowserError>,
    ) -> Result<T, BrowserError> {
        let started = Instant::now();
        let page = with_timeout(wait.limit, self.open(viewport)).await?;

        let remaining = wait.limit.saturating_sub(started.elapsed());
        let result = with_timeout(remaining, async {
            self.load(&page, url, wait).await?;
            read(&page).await
        })
        .await
        .map_err(|e| match e {
            BrowserError::Timeout(_) => BrowserError::Timeout(wait.limit),
            other => other,
        });

        close_quietly(page).await;
        result
    }

    /// Navigate and wait: network idle, settle delay, then images.
    async fn load(&self, page: &Page, url: &Url, wait: &PageWait) -> Result<(), BrowserError> {
        page.goto(url.as_str()).await?;
        wait_until_idle(page, wait).await?;
        tokio::time::sleep(wait.settle).await;
        wait_for_images(page, wait.image_wait).await
    }
}

impl Drop for ChromeRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

impl Renderer for ChromeRenderer {
    async fn render(
        &self,
        url: &Url,
        viewport: &Viewport,
        wait: &PageWait,
    ) -> Result<String, BrowserError> {
        let html = self
            .in_tab(url, viewport, wait, async |page: &Page| -> Result<String, BrowserError> {
                Ok(page.content().await?)
            })
            .await?;

        if html.trim_start().starts_with("<!") {
            Ok(html)
        } else {
            Ok(format!("<!DOCTYPE html>\n{html}"))
        }
    }

    async fn screenshot(
        &self,
        url: &Url,
        viewport: &Viewport,
        wait: &PageWait,
    ) -> Result<Vec<u8>, BrowserError> {
        self.in_tab(url, viewport, wait, async |page: &Page| -> Result<Vec<u8>, BrowserError> {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build();
            Ok(page.screenshot(params).await?)
        })
        .await
    }
}

// ============================================================================
// Readiness probes
// ============================================================================

async fn eval_json<T: DeserializeOwned>(page: &Page, expr: &str) -> Result<T, BrowserError> {
    let raw: String = page
        .evaluate(expr)
        .await?
        .into_value()
        .map_err(|e| BrowserError::Script(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| BrowserError::Script(e.to_string()))
}

/// Wait until the document is complete and no new resources were requested
/// for `wait.idle`. Gives up quietly after `wait.idle_budget`.
async fn wait_until_idle(page: &Page, wait: &PageWait) -> Result<(), BrowserError> {
    let started = Instant::now();
    let mut last_count = usize::MAX;
    let mut quiet_since = Instant::now();

    loop {
        let probe: IdleProbe = eval_json(page, IDLE_PROBE).await?;
        if probe.resources != last_count {
            last_count = probe.resources;
            quiet_since = Instant::now();
        }
        if probe.ready == "complete" && quiet_since.elapsed() >= wait.idle {
            return Ok(());
        }
        if started.elapsed() >= wait.idle_budget {
            debug!("browser"; "network never went idle, continuing after {:?}", wait.idle_budget);
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait for every `<img>` to finish (or fail) loading, bounded by `limit`.
async fn wait_for_images(page: &Page, limit: Duration) -> Result<(), BrowserError> {
    let started = Instant::now();
    while started.elapsed() < limit {
        if eval_json::<bool>(page, IMAGES_PROBE).await? {
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    debug!("browser"; "images still loading after {:?}", limit);
    Ok(())
}

async fn close_quietly(page: Page) {
    if let Err(e) = page.close().await {
        debug!("browser"; "failed to close tab: {e}");
    }
}
