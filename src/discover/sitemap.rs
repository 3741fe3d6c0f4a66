//! `sitemap.xml` reader.
//!
//! Framer publishes a flat `<urlset>`; larger sites may publish a
//! `<sitemapindex>` whose children are followed one level deep.

use quick_xml::{Reader, events::Event};
use std::time::Duration;
use url::Url;

use crate::{debug, log, utils::html, utils::http};

/// Root element kind of a sitemap document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapKind {
    UrlSet,
    Index,
}

/// `<loc>` entries of one sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sitemap {
    pub kind: SitemapKind,
    pub locs: Vec<String>,
}

/// Parse a sitemap document, collecting every `<loc>` in document order.
pub fn parse(xml: &str) -> Result<Sitemap, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut kind = None;
    let mut locs = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(elem) => match elem.local_name().as_ref() {
                b"urlset" if kind.is_none() => kind = Some(SitemapKind::UrlSet),
                b"sitemapindex" if kind.is_none() => kind = Some(SitemapKind::Index),
                b"loc" => current = Some(String::new()),
                _ => {}
            },
            Event::Text(text) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&html::unescape(&String::from_utf8_lossy(&text)));
                }
            }
            Event::CData(data) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::GeneralRef(entity) => {
                if let Some(buf) = current.as_mut() {
                    let name = String::from_utf8_lossy(&entity);
                    buf.push_str(&html::unescape(&format!("&{name};")));
                }
            }
            Event::End(elem) if elem.local_name().as_ref() == b"loc" => {
                if let Some(loc) = current.take() {
                    let loc = loc.trim();
                    if !loc.is_empty() {
                        locs.push(loc.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Sitemap {
        kind: kind.unwrap_or(SitemapKind::UrlSet),
        locs,
    })
}

/// Fetch `/sitemap.xml` and return every page URL it lists.
///
/// A missing or malformed sitemap is logged and yields no URLs.
pub async fn fetch_page_urls(client: &reqwest::Client, origin: &Url, timeout: Duration) -> Vec<String> {
    let Ok(root) = origin.join("/sitemap.xml") else {
        return Vec::new();
    };

    let Some(sitemap) = fetch_one(client, &root, timeout).await else {
        return Vec::new();
    };

    match sitemap.kind {
        SitemapKind::UrlSet => sitemap.locs,
        SitemapKind::Index => {
            let mut urls = Vec::new();
            for child in &sitemap.locs {
                let Ok(child_url) = Url::parse(child) else {
                    debug!("discover"; "skipping malformed child sitemap {}", child);
                    continue;
                };
                // One level only: nested indexes are not followed
                if let Some(child) = fetch_one(client, &child_url, timeout).await
                    && child.kind == SitemapKind::UrlSet
                {
                    urls.extend(child.locs);
                }
            }
            urls
        }
    }
}

async fn fetch_one(client: &reqwest::Client, url: &Url, timeout: Duration) -> Option<Sitemap> {
    let body = match http::get_text(client, url, timeout).await {
        Ok(body) => body,
        Err(e) => {
            log!("discover"; "sitemap {} unavailable ({}), continuing without it", url, e);
            return None;
        }
    };
    match parse(&body) {
        Ok(sitemap) => Some(sitemap),
        Err(e) => {
            log!("discover"; "sitemap {} is not valid XML ({}), ignoring", url, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixtureServer;

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://site.com/</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc> https://site.com/about </loc></url>
  <url><loc>https://site.com/search?q=a&amp;b=c</loc></url>
</urlset>"#;
        let sitemap = parse(xml).unwrap();
        assert_eq!(sitemap.kind, SitemapKind::UrlSet);
        assert_eq!(
            sitemap.locs,
            vec![
                "https://site.com/",
                "https://site.com/about",
                "https://site.com/search?q=a&b=c",
            ]
        );
    }

    #[test]
    fn test_parse_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://site.com/sitemap-pages.xml</loc></sitemap>
</sitemapindex>"#;
        let sitemap = parse(xml).unwrap();
        assert_eq!(sitemap.kind, SitemapKind::Index);
        assert_eq!(sitemap.locs, vec!["https://site.com/sitemap-pages.xml"]);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse("<urlset><url><loc>x</url></urlset>").is_err());
    }

    #[tokio::test]
    async fn test_fetch_follows_index_one_level() {
        let server = FixtureServer::start();
        let base = server.url();
        server.add(
            "/sitemap.xml",
            "application/xml",
            format!(
                "<sitemapindex><sitemap><loc>{base}pages.xml</loc></sitemap>\
                 <sitemap><loc>{base}nested.xml</loc></sitemap></sitemapindex>"
            ),
        );
        server.add(
            "/pages.xml",
            "application/xml",
            format!("<urlset><url><loc>{base}about</loc></url></urlset>"),
        );
        server.add(
            "/nested.xml",
            "application/xml",
            format!("<sitemapindex><sitemap><loc>{base}deeper.xml</loc></sitemap></sitemapindex>"),
        );

        let client = reqwest::Client::new();
        let urls = fetch_page_urls(&client, &base, Duration::from_secs(5)).await;
        assert_eq!(urls, vec![format!("{base}about")]);
        assert_eq!(server.hits("/deeper.xml"), 0);
    }

    #[tokio::test]
    async fn test_fetch_missing_sitemap_is_empty() {
        let server = FixtureServer::start();
        let client = reqwest::Client::new();
        let urls = fetch_page_urls(&client, &server.url(), Duration::from_secs(5)).await;
        assert!(urls.is_empty());
    }
}
