//! Reference rewriting: splice local paths into scanned spans.

use std::ops::Range;

use url::Url;

use super::AssetTable;
use super::scan::{Reference, Target};
use crate::utils::path::route::relative_to_root;

/// Replace `span` of the source text with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Range<usize>,
    pub replacement: String,
}

/// Edits for a document `depth` directories below the bundle root.
///
/// Assets that were not downloaded (failed or preserved) keep their original
/// reference, so the page degrades to the remote URL instead of breaking.
pub fn plan_edits(refs: &[Reference], table: &AssetTable, depth: usize) -> Vec<Edit> {
    refs.iter()
        .filter_map(|r| {
            let replacement = match &r.target {
                Target::Asset { url, fragment, .. } => {
                    let local = table.local_path(url)?;
                    with_fragment(relative_to_root(depth, &local), fragment.as_deref())
                }
                Target::Page { route, fragment } => {
                    let fragment = (!fragment.is_empty()).then_some(fragment.as_str());
                    with_fragment(route.relative_from(depth), fragment)
                }
            };
            Some(Edit {
                span: r.span.clone(),
                replacement,
            })
        })
        .collect()
}

fn with_fragment(path: String, fragment: Option<&str>) -> String {
    match fragment {
        Some(f) => format!("{path}#{f}"),
        None => path,
    }
}

/// Apply sorted, non-overlapping edits in one pass.
pub fn splice(text: &str, edits: &[Edit]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.span.start < cursor || edit.span.end > text.len() {
            continue;
        }
        out.push_str(&text[cursor..edit.span.start]);
        out.push_str(&edit.replacement);
        cursor = edit.span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Occurrences of the source host left in `text`.
pub fn residual_origin(text: &str, origin: &Url) -> usize {
    match origin.host_str() {
        Some(host) if !host.is_empty() => text.matches(host).count(),
        _ => 0,
    }
}
