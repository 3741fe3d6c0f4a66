//! Static preview server for the generated bundle.
//!
//! Used in the foreground by `framer-clone serve` and in the background by
//! the parity verifier, which needs the clone reachable over HTTP.

mod path;
mod response;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, bail};
use tiny_http::{Request, Server};
use url::Url;

use crate::config::CloneConfig;
use crate::core::{is_shutdown, register_server};
use crate::utils::path::display_relative;
use crate::{debug, log};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Request handler threads per server.
const WORKERS: usize = 4;

/// Serve `<out>/public` until Ctrl+C.
pub fn serve_bundle(config: &CloneConfig) -> Result<()> {
    let paths = config.paths();
    let root = paths.public_dir();
    if !root.is_dir() {
        bail!(
            "no bundle at {} (run `clone` first)",
            display_relative(&root, paths.root())
        );
    }

    let (server, addr) = bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    register_server(Arc::clone(&server));

    log!("serve"; "{}", base_url(addr)?);
    run_request_loop(&server, Arc::from(root), worker_pool()?);
    Ok(())
}

/// Bind to `interface`, trying the next ports when `base_port` is taken.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = String::new();

    for offset in 0..MAX_PORT_RETRIES {
        let Some(port) = base_port.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    bail!(
        "failed to bind {} after {} attempts from port {}: {}",
        interface,
        MAX_PORT_RETRIES,
        base_port,
        last_error
    )
}

/// Background server over a bundle directory, stopped on drop.
pub struct PreviewServer {
    server: Arc<Server>,
    url: Url,
    thread: Option<JoinHandle<()>>,
}

impl PreviewServer {
    pub fn start(root: &Path, interface: IpAddr, port: u16) -> Result<Self> {
        let (server, addr) = bind_with_retry(interface, port)?;
        let url = base_url(addr)?;
        let server = Arc::new(server);
        let root: Arc<Path> = Arc::from(root.to_path_buf());
        let pool = worker_pool()?;

        let thread = {
            let server = Arc::clone(&server);
            thread::Builder::new()
                .name("preview".into())
                .spawn(move || run_request_loop(&server, root, pool))
                .context("failed to spawn preview server thread")?
        };

        debug!("serve"; "preview on {}", url);
        Ok(Self {
            server,
            url,
            thread: Some(thread),
        })
    }

    /// Base URL with trailing slash.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Drop for PreviewServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// URL a local browser can reach; wildcard binds are addressed via loopback.
fn base_url(addr: SocketAddr) -> Result<Url, url::ParseError> {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    Url::parse(&format!("http://{}/", SocketAddr::new(ip, addr.port())))
}

fn worker_pool() -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(WORKERS)
        .thread_name(|i| format!("serve-{i}"))
        .build()
        .context("failed to create request thread pool")
}

fn run_request_loop(server: &Server, root: Arc<Path>, pool: rayon::ThreadPool) {
    for request in server.incoming_requests() {
        let root = Arc::clone(&root);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &root) {
                debug!("serve"; "request error: {e}");
            }
        });
    }
}

fn handle_request(request: Request, root: &Path) -> Result<()> {
    if is_shutdown() {
        return response::respond_unavailable(request);
    }

    let resolved: Option<PathBuf> = path::resolve_path(request.url(), root);
    match resolved {
        Some(file) => response::respond_file(request, &file),
        None => {
            debug!("serve"; "404 {}", request.url());
            response::respond_not_found(request, root)
        }
    }
}
