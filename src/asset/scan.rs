//! Reference scanning (pure, no side effects).
//!
//! Every reference is reported with the byte span of its raw text in the
//! scanned document, so rewriting is a splice of non-overlapping spans rather
//! than a textual search-and-replace.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::Category;
use crate::core::{LinkKind, RoutePath, path_extension};
use crate::discover::{Classified, classify};
use crate::utils::html::{self, attr};
use crate::utils::path::route::split_path_fragment;

/// `url(...)` in CSS, inside `<style>`, `style=""` or stylesheets.
///
/// Serialized DOMs write quotes inside attributes as entities, e.g.
/// `style="background: url(&quot;https://…&quot;)"`; those forms come before
/// the unquoted one so the entity is never taken as part of the URL.
static RE_CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"url\(\s*(?:"([^"]*)"|'([^']*)'|(?:&quot;|&#34;)([^"<>]*?)(?:&quot;|&#34;)|(?:&#39;|&#x27;|&apos;)([^"<>]*?)(?:&#39;|&#x27;|&apos;)|([^)"'\s&][^)"'\s]*))\s*\)"#,
    )
    .unwrap()
});

/// `@import "x.css"` (the `@import url(...)` form is covered by `url()`).
static RE_CSS_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@import\s+(?:"([^"]*)"|'([^']*)')"#).unwrap());

/// Static and dynamic ES-module specifiers: `from"x"`, `import "x"`, `import("x")`.
static RE_JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:from|import)\s*\(?\s*(?:"([^"\n]+)"|'([^'\n]+)')"#).unwrap()
});

/// Absolute module URLs anywhere (inline scripts, hydration data).
static RE_MODULE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'`<>()\\]+?\.mjs\b"#).unwrap());

/// What a reference points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Downloadable resource; `fragment` is re-appended after rewriting.
    Asset {
        url: Url,
        hint: Category,
        fragment: Option<String>,
    },
    /// Same-origin page link written as an absolute or site-root URL.
    Page { route: RoutePath, fragment: String },
}

/// One reference found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub span: Range<usize>,
    pub target: Target,
}

// ============================================================================
// HTML
// ============================================================================

/// Scan a captured page for asset references and absolute page links.
///
/// References are returned in document order with overlaps removed.
pub fn scan_document(doc: &str, page_url: &Url, origin: &Url) -> Vec<Reference> {
    let mut refs = Vec::new();

    if let Ok(dom) = tl::parse(doc, tl::ParserOptions::default()) {
        for tag in dom.nodes().iter().filter_map(|n| n.as_tag()) {
            let name = tag.name().as_utf8_str().to_ascii_lowercase();
            scan_tag(doc, &name, tag, page_url, origin, &mut refs);
        }
    }

    // Inline CSS anywhere in the document
    refs.extend(scan_css(doc, page_url));

    for m in RE_MODULE_URL.find_iter(doc) {
        push_asset(&mut refs, m.range(), m.as_str(), page_url, Category::Script);
    }

    dedup_overlaps(refs)
}

fn scan_tag(
    doc: &str,
    name: &str,
    tag: &tl::HTMLTag,
    page_url: &Url,
    origin: &Url,
    refs: &mut Vec<Reference>,
) {
    let asset = |key: &'static str, hint: Category, refs: &mut Vec<Reference>| {
        if let Some(span) = attr(tag, key).and_then(|value| span_of(doc, value)) {
            push_asset(refs, span.clone(), &doc[span], page_url, hint);
        }
    };

    match name {
        "img" | "source" => {
            asset("src", Category::Image, refs);
            scan_srcset(doc, attr(tag, "srcset"), page_url, refs);
        }
        "video" => {
            asset("src", Category::Image, refs);
            asset("poster", Category::Image, refs);
        }
        "audio" | "track" => asset("src", Category::Image, refs),
        "input" if attr_lower(tag, "type") == "image" => asset("src", Category::Image, refs),
        "script" => asset("src", Category::Script, refs),
        "link" => {
            if let Some(hint) = link_hint(&attr_lower(tag, "rel"), &attr_lower(tag, "as")) {
                asset("href", hint, refs);
            }
        }
        "meta" => {
            let property = attr_lower(tag, "property");
            let meta_name = attr_lower(tag, "name");
            if ["og:image", "twitter:image", "msapplication-tileimage"]
                .iter()
                .any(|k| property == *k || meta_name == *k)
            {
                asset("content", Category::Image, refs);
            }
        }
        "a" => {
            if let Some(span) = attr(tag, "href").and_then(|value| span_of(doc, value)) {
                push_page_link(refs, span.clone(), &doc[span], page_url, origin);
            }
        }
        _ => {}
    }
}

fn attr_lower(tag: &tl::HTMLTag, key: &'static str) -> String {
    attr(tag, key)
        .map(|b| String::from_utf8_lossy(b).to_ascii_lowercase())
        .unwrap_or_default()
}

/// Category hint for `<link>` by `rel` (and `as` for preloads).
fn link_hint(rel: &str, as_: &str) -> Option<Category> {
    let rels: Vec<&str> = rel.split_ascii_whitespace().collect();
    let has = |r: &str| rels.contains(&r);

    if has("stylesheet") {
        Some(Category::Style)
    } else if has("modulepreload") {
        Some(Category::Script)
    } else if has("preload") || has("prefetch") {
        Some(match as_ {
            "font" => Category::Font,
            "style" => Category::Style,
            "script" => Category::Script,
            "image" => Category::Image,
            _ => Category::Data,
        })
    } else if has("icon") || has("apple-touch-icon") || has("mask-icon") {
        Some(Category::Image)
    } else if has("manifest") {
        Some(Category::Data)
    } else {
        None
    }
}

/// `srcset` candidates: `url [descriptor], url [descriptor], ...`
fn scan_srcset(doc: &str, value: Option<&[u8]>, base: &Url, refs: &mut Vec<Reference>) {
    let Some(span) = value.and_then(|v| span_of(doc, v)) else {
        return;
    };
    let text = &doc[span.clone()];
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut end = i;
        // A trailing comma ends the candidate without a descriptor
        while end > start && bytes[end - 1] == b',' {
            end -= 1;
        }
        if end > start {
            let raw = &text[start..end];
            push_asset(
                refs,
                span.start + start..span.start + end,
                raw,
                base,
                Category::Image,
            );
        }
        // Skip the descriptor
        if end == i {
            while i < bytes.len() && bytes[i] != b',' {
                i += 1;
            }
        }
    }
}

// ============================================================================
// CSS / JS
// ============================================================================

/// `url(...)` and `@import` references, resolved against `base`.
pub fn scan_css(text: &str, base: &Url) -> Vec<Reference> {
    let mut refs = Vec::new();
    for caps in RE_CSS_URL.captures_iter(text) {
        if let Some(m) = (1..=5).find_map(|i| caps.get(i)) {
            push_asset(&mut refs, m.range(), m.as_str(), base, Category::Image);
        }
    }
    for caps in RE_CSS_IMPORT.captures_iter(text) {
        if let Some(m) = caps.get(1).or(caps.get(2)) {
            push_asset(&mut refs, m.range(), m.as_str(), base, Category::Style);
        }
    }
    refs.sort_by_key(|r| r.span.start);
    refs
}

/// Relative and absolute ES-module specifiers (bare package names are skipped).
pub fn scan_js(text: &str, base: &Url) -> Vec<Reference> {
    let mut refs = Vec::new();
    for caps in RE_JS_IMPORT.captures_iter(text) {
        let Some(m) = caps.get(1).or(caps.get(2)) else {
            continue;
        };
        let specifier = m.as_str();
        let resolvable = specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier.starts_with('/')
            || LinkKind::is_http(specifier);
        if resolvable {
            push_asset(&mut refs, m.range(), specifier, base, Category::Script);
        }
    }
    for m in RE_MODULE_URL.find_iter(text) {
        push_asset(&mut refs, m.range(), m.as_str(), base, Category::Script);
    }
    dedup_overlaps(refs)
}

// ============================================================================
// Helpers
// ============================================================================

/// Byte range of `value` inside `doc`, when `value` borrows from it.
fn span_of(doc: &str, value: &[u8]) -> Option<Range<usize>> {
    if value.is_empty() {
        return None;
    }
    let start = (value.as_ptr() as usize).checked_sub(doc.as_ptr() as usize)?;
    let end = start + value.len();
    (end <= doc.len() && doc.is_char_boundary(start) && doc.is_char_boundary(end))
        .then_some(start..end)
}

/// Resolve `raw` (as written, entities escaped) to an absolute http(s) URL.
fn resolve(raw: &str, base: &Url) -> Option<Url> {
    let value = html::unescape(raw.trim());
    if value.is_empty() || !LinkKind::parse(&value).is_resolvable() {
        return None;
    }
    base.join(&value)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}

fn push_asset(refs: &mut Vec<Reference>, span: Range<usize>, raw: &str, base: &Url, hint: Category) {
    let Some(mut url) = resolve(raw, base) else {
        return;
    };
    let fragment = url.fragment().map(str::to_string);
    url.set_fragment(None);
    refs.push(Reference {
        span,
        target: Target::Asset {
            url,
            hint,
            fragment,
        },
    });
}

fn push_page_link(
    refs: &mut Vec<Reference>,
    span: Range<usize>,
    raw: &str,
    page_url: &Url,
    origin: &Url,
) {
    let unescaped = html::unescape(raw.trim());
    // Document-relative links already work in the bundle
    if !matches!(
        LinkKind::parse(&unescaped),
        LinkKind::Absolute(_) | LinkKind::ProtocolRelative(_) | LinkKind::SiteRoot(_)
    ) {
        return;
    }
    if let Classified::Route(route) = classify(origin, page_url, raw) {
        let (_, fragment) = split_path_fragment(&unescaped);
        refs.push(Reference {
            span,
            target: Target::Page {
                route,
                fragment: fragment.to_string(),
            },
        });
    }
}

/// Sort by position and drop references overlapping an earlier one.
fn dedup_overlaps(mut refs: Vec<Reference>) -> Vec<Reference> {
    refs.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then(b.span.end.cmp(&a.span.end))
    });
    let mut last_end = 0;
    refs.retain(|r| {
        if r.span.start >= last_end {
            last_end = r.span.end;
            true
        } else {
            false
        }
    });
    refs
}

/// Lowercase extension of the URL's last path segment.
pub fn url_extension(url: &Url) -> Option<String> {
    path_extension(url.path())
}
