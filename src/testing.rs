//! Test fixtures: a local origin server and a scripted renderer.

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use image::{ImageFormat, RgbaImage};
use parking_lot::Mutex;
use tiny_http::{Header, Response, Server, StatusCode};
use url::Url;

use crate::browser::{BrowserError, PageWait, Renderer, Viewport, with_timeout};

// ============================================================================
// FixtureServer
// ============================================================================

#[derive(Clone)]
struct Fixture {
    status: u16,
    content_type: String,
    body: Vec<u8>,
}

#[derive(Default)]
struct FixtureState {
    files: HashMap<String, Fixture>,
    hits: HashMap<String, usize>,
}

/// Serves registered bodies on `127.0.0.1:<random port>` and counts hits.
///
/// Unregistered paths answer 404.
pub struct FixtureServer {
    server: Arc<Server>,
    addr: SocketAddr,
    state: Arc<Mutex<FixtureState>>,
    thread: Option<JoinHandle<()>>,
}

impl FixtureServer {
    pub fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let state = Arc::new(Mutex::new(FixtureState::default()));

        let thread = {
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                for request in server.incoming_requests() {
                    let key = request.url().to_string();
                    let fixture = {
                        let mut state = state.lock();
                        *state.hits.entry(key.clone()).or_default() += 1;
                        state.files.get(&key).cloned()
                    };
                    let response = match fixture {
                        Some(f) => Response::from_data(f.body)
                            .with_status_code(StatusCode(f.status))
                            .with_header(
                                Header::from_bytes("Content-Type", f.content_type).unwrap(),
                            ),
                        None => Response::from_data(b"not found".to_vec())
                            .with_status_code(StatusCode(404)),
                    };
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            server,
            addr,
            state,
            thread: Some(thread),
        }
    }

    /// Base URL with trailing slash.
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }

    /// Register `body` at `path` (path may include a query string).
    pub fn add(&self, path: &str, content_type: &str, body: impl Into<Vec<u8>>) {
        self.add_with_status(path, 200, content_type, body);
    }

    pub fn add_with_status(
        &self,
        path: &str,
        status: u16,
        content_type: &str,
        body: impl Into<Vec<u8>>,
    ) {
        self.state.lock().files.insert(
            path.to_string(),
            Fixture {
                status,
                content_type: content_type.to_string(),
                body: body.into(),
            },
        );
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.lock().hits.get(path).copied().unwrap_or(0)
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// ============================================================================
// FakeRenderer
// ============================================================================

/// Scripted outcome for one URL.
#[derive(Debug, Clone)]
pub enum Scripted {
    Html(String),
    Png(Vec<u8>),
    /// Never completes; runs into `PageWait::limit`.
    Hang,
    Fail(String),
}

/// Renderer answering from a script instead of a browser.
///
/// Screenshots are looked up as `<url>@<viewport>` first, then `<url>`.
/// Every call opens a pretend tab and closes it on the way out, the way
/// `ChromeRenderer` does, so tests can check nothing is left open.
#[derive(Default)]
pub struct FakeRenderer {
    script: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
    tabs: Mutex<TabCount>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TabCount {
    pub opened: usize,
    pub closed: usize,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, key: impl Into<String>, outcome: Scripted) -> &Self {
        self.script.lock().insert(key.into(), outcome);
        self
    }

    pub fn page(&self, url: &Url, html: &str) -> &Self {
        self.on(url.as_str(), Scripted::Html(html.to_string()))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn tabs(&self) -> TabCount {
        *self.tabs.lock()
    }

    /// Play `outcome` inside a tab bounded by `wait.limit`.
    async fn in_tab<T>(
        &self,
        wait: &PageWait,
        outcome: Option<Scripted>,
        pick: impl FnOnce(Scripted) -> Option<T>,
        missing: &str,
    ) -> Result<T, BrowserError> {
        self.tabs.lock().opened += 1;
        let result = with_timeout(wait.limit, async {
            match outcome {
                Some(Scripted::Hang) => std::future::pending().await,
                Some(Scripted::Fail(reason)) => Err(BrowserError::Protocol(reason)),
                Some(other) => pick(other).ok_or_else(|| BrowserError::Protocol(missing.into())),
                None => Err(BrowserError::Protocol(missing.into())),
            }
        })
        .await;
        self.tabs.lock().closed += 1;
        result
    }

    fn lookup(&self, keys: &[String]) -> Option<Scripted> {
        self.calls.lock().push(keys[0].clone());
        let script = self.script.lock();
        keys.iter().find_map(|k| script.get(k).cloned())
    }
}

impl Renderer for FakeRenderer {
    async fn render(
        &self,
        url: &Url,
        _viewport: &Viewport,
        wait: &PageWait,
    ) -> Result<String, BrowserError> {
        let outcome = self.lookup(&[url.to_string()]);
        let html = |s: Scripted| match s {
            Scripted::Html(html) => Some(html),
            _ => None,
        };
        self.in_tab(wait, outcome, html, "net::ERR_NAME_NOT_RESOLVED")
            .await
    }

    async fn screenshot(
        &self,
        url: &Url,
        viewport: &Viewport,
        wait: &PageWait,
    ) -> Result<Vec<u8>, BrowserError> {
        let outcome = self.lookup(&[format!("{url}@{}", viewport.name), url.to_string()]);
        let png = |s: Scripted| match s {
            Scripted::Png(png) => Some(png),
            _ => None,
        };
        self.in_tab(wait, outcome, png, "net::ERR_CONNECTION_REFUSED")
            .await
    }
}

// ============================================================================
// Images
// ============================================================================

/// Encode an image as PNG bytes.
pub fn png_bytes(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Solid-color canvas.
pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, image::Rgba(rgba))
}
