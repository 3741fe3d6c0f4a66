//! HTTP client shared by the sitemap reader and the asset downloader.

use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Request(String),
}

impl FetchError {
    /// Client errors other than 408/429 will not change on retry.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Status(code) if (400..500).contains(code) && *code != 408 && *code != 429)
    }
}

/// A body plus the `Content-Type` the server declared.
#[derive(Debug)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Build a client with the capture user agent and a per-request timeout.
pub fn build_client(user_agent: &str, timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("failed to build HTTP client")
}

/// GET `url`, failing on non-success status.
pub async fn get(client: &reqwest::Client, url: &Url, timeout: Duration) -> Result<Fetched, FetchError> {
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Request(e.without_url().to_string())
        }
    };

    let response = client.get(url.as_str()).send().await.map_err(map_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await.map_err(map_err)?.to_vec();

    Ok(Fetched {
        bytes,
        content_type,
    })
}

/// GET `url` as (lossy) UTF-8 text.
pub async fn get_text(client: &reqwest::Client, url: &Url, timeout: Duration) -> Result<String, FetchError> {
    let fetched = get(client, url, timeout).await?;
    Ok(String::from_utf8_lossy(&fetched.bytes).into_owned())
}
