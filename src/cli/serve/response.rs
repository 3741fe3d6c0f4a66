//! HTTP response handlers.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::utils::mime::{self, types};

/// Respond with a bundle file, honouring `Range` for media seeking.
pub fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    if let Some(range) = range_header(&request) {
        return respond_range(request, path, content_type, &range);
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    send_body(request, 200, content_type, body)
}

fn respond_range(request: Request, path: &Path, content_type: &str, range: &str) -> Result<()> {
    let file_size = fs::metadata(path)?.len();

    let Some((start, end)) = parse_range(range, file_size) else {
        let mut response = Response::empty(StatusCode(416));
        if let Some(h) = header("Content-Range", &format!("bytes */{file_size}")) {
            response.add_header(h);
        }
        request.respond(response)?;
        return Ok(());
    };

    let length = end - start + 1;
    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(start))?;

    let headers = [
        header("Content-Type", content_type),
        header("Content-Range", &format!("bytes {start}-{end}/{file_size}")),
        header("Accept-Ranges", "bytes"),
    ];
    let response = Response::new(
        StatusCode(206),
        headers.into_iter().flatten().collect(),
        file.take(length),
        usize::try_from(length).ok(),
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Parse `bytes=start-end`, `bytes=start-` or `bytes=-suffix` into an
/// inclusive range, `None` when unsatisfiable.
fn parse_range(range: &str, file_size: u64) -> Option<(u64, u64)> {
    let ranges = range.trim().strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;
    let last = file_size.checked_sub(1)?;

    let (start, end) = match (start.trim(), end.trim()) {
        ("", suffix) => {
            let suffix: u64 = suffix.parse().ok()?;
            (file_size.saturating_sub(suffix), last)
        }
        (start, "") => (start.parse().ok()?, last),
        (start, end) => (start.parse().ok()?, end.parse::<u64>().ok()?.min(last)),
    };
    (start <= end).then_some((start, end))
}

fn range_header(request: &Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Range"))
        .map(|h| h.value.to_string())
}

/// Respond with the bundle's `404.html` when present, plain text otherwise.
pub fn respond_not_found(request: Request, root: &Path) -> Result<()> {
    let custom = root.join("404.html");
    let has_custom = custom.is_file();

    if is_head_request(&request) {
        let content_type = if has_custom { types::HTML } else { types::PLAIN };
        return send_head(request, 404, content_type);
    }

    if has_custom && let Ok(body) = fs::read(&custom) {
        return send_body(request, 404, types::HTML, body);
    }
    send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 503 while shutting down.
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, types::PLAIN, b"503 Service Unavailable".to_vec())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &str) -> Result<()> {
    let mut response = Response::empty(StatusCode(status));
    if let Some(h) = header("Content-Type", content_type) {
        response.add_header(h);
    }
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    for h in [header("Content-Type", content_type), header("Cache-Control", "no-cache")]
        .into_iter()
        .flatten()
    {
        response.add_header(h);
    }
    request.respond(response)?;
    Ok(())
}

fn header(key: &str, value: &str) -> Option<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes()).ok()
}
