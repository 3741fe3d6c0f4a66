//! `PARITY_REPORT.md` rendering.

use std::fmt::Write as _;

use url::Url;

use super::ParityResult;
use crate::asset::{Inventory, bucket_totals};
use crate::browser::Viewport;
use crate::core::RoutePath;
use crate::summary::Failure;

/// Differences every Framer clone shows regardless of capture quality.
const KNOWN_DIFFERENCES: &[&str] = &[
    "Framer editor badge not present in clone (expected)",
    "Minor page-height variations due to rendering timing",
    "React hydration console warnings (cosmetic only)",
];

/// Everything the report describes besides the comparisons themselves.
pub struct ReportContext<'a> {
    pub source: &'a Url,
    pub routes: &'a [RoutePath],
    pub inventory: &'a Inventory,
    pub viewports: &'a [Viewport],
}

/// Verdict marker for a similarity score.
pub fn verdict(score: f64) -> &'static str {
    if score >= 95.0 {
        "✓"
    } else if score >= 85.0 {
        "⚠"
    } else {
        "✗"
    }
}

/// Render the report. `comparisons` is `None` when the check was skipped.
pub fn render(ctx: &ReportContext, comparisons: Option<(&[ParityResult], &[Failure])>) -> String {
    let mut out = String::from("# Parity Report: Framer Site Clone\n\n");
    let _ = writeln!(out, "**Source:** {}  ", ctx.source);
    out.push_str("**Approach:** Pure static HTML with localized assets\n\n");

    out.push_str("## Discovered Routes\n\n");
    for route in ctx.routes {
        let _ = writeln!(out, "- `{route}`");
    }

    out.push_str("\n## Asset Inventory\n\n");
    let mut listed = false;
    for (category, records) in ctx.inventory {
        let (count, bytes) = bucket_totals(records);
        if count == 0 {
            continue;
        }
        listed = true;
        #[allow(clippy::cast_precision_loss)]
        let mb = bytes as f64 / 1024.0 / 1024.0;
        let _ = writeln!(out, "- **{category}**: {count} files ({mb:.2} MB)");
    }
    if !listed {
        out.push_str("No assets were localized.\n");
    }

    out.push_str("\n## Visual Parity\n\n");
    match comparisons {
        Some((results, failures)) => {
            render_table(&mut out, ctx, results);
            if !failures.is_empty() {
                out.push_str("\n### Failed Comparisons\n\n");
                for failure in failures {
                    let _ = writeln!(out, "- `{}`: {}", failure.key, failure.reason);
                }
            }
        }
        None => out.push_str("Skipped (`--skip-parity`). Run `framer-clone verify` to compare.\n"),
    }

    out.push_str("\n## Known Differences\n\n");
    for (i, text) in KNOWN_DIFFERENCES.iter().enumerate() {
        let _ = writeln!(out, "{}. {text}", i + 1);
    }
    out
}

fn render_table(out: &mut String, ctx: &ReportContext, results: &[ParityResult]) {
    out.push_str("| Route |");
    for vp in ctx.viewports {
        let _ = write!(out, " {} ({}×{}) |", vp.name, vp.width, vp.height);
    }
    out.push_str("\n|-------|");
    for _ in ctx.viewports {
        out.push_str("------|");
    }
    out.push('\n');

    for route in ctx.routes {
        let _ = write!(out, "| `{route}` |");
        for vp in ctx.viewports {
            let cell = results
                .iter()
                .find(|r| &r.route == route && r.viewport == vp.name)
                .map(|r| {
                    let size = if r.dimension_mismatch { " (size differs)" } else { "" };
                    format!("{} {:.2}%{size}", verdict(r.score), r.score)
                })
                .unwrap_or_else(|| "n/a".to_string());
            let _ = write!(out, " {cell} |");
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetRecord, AssetStatus, Category};
    use crate::summary::Phase;

    fn result(route: &str, viewport: &str, score: f64) -> ParityResult {
        ParityResult {
            route: RoutePath::from_decoded(route),
            viewport: viewport.into(),
            score,
            dimension_mismatch: false,
            source: String::new(),
            local: String::new(),
            diff: String::new(),
        }
    }

    fn inventory() -> Inventory {
        let mut inventory = Inventory::new();
        inventory.insert(
            Category::Font,
            vec![AssetRecord {
                url: "https://cdn.com/a.woff2".into(),
                category: Category::Font,
                local: Some("assets/fonts/a.woff2".into()),
                size: 2 * 1024 * 1024,
                content_type: None,
                status: AssetStatus::Downloaded,
            }],
        );
        inventory
    }

    #[test]
    fn test_verdict_thresholds() {
        assert_eq!(verdict(100.0), "✓");
        assert_eq!(verdict(95.0), "✓");
        assert_eq!(verdict(94.99), "⚠");
        assert_eq!(verdict(85.0), "⚠");
        assert_eq!(verdict(42.0), "✗");
    }

    #[test]
    fn test_render_report() {
        let source = Url::parse("https://site.framer.website/").unwrap();
        let routes = vec![RoutePath::root(), RoutePath::from_decoded("/about")];
        let inventory = inventory();
        let viewports = vec![Viewport::desktop(), Viewport::mobile()];
        let ctx = ReportContext {
            source: &source,
            routes: &routes,
            inventory: &inventory,
            viewports: &viewports,
        };

        let results = vec![
            result("/", "desktop", 99.5),
            result("/", "mobile", 88.0),
            result("/about", "desktop", 60.25),
        ];
        let failures = vec![Failure::new(Phase::Parity, "/about@mobile", "timed out after 60s")];
        let text = render(&ctx, Some((&results, &failures)));

        assert!(text.contains("**Source:** https://site.framer.website/  "));
        assert!(text.contains("- **fonts**: 1 files (2.00 MB)"));
        assert!(text.contains("| Route | desktop (1920×1080) | mobile (375×667) |"));
        assert!(text.contains("| `/` | ✓ 99.50% | ⚠ 88.00% |"));
        assert!(text.contains("| `/about` | ✗ 60.25% | n/a |"));
        assert!(text.contains("- `/about@mobile`: timed out after 60s"));
        assert!(text.contains("3. React hydration console warnings (cosmetic only)"));
    }

    #[test]
    fn test_render_skipped() {
        let source = Url::parse("https://site.framer.website/").unwrap();
        let routes = vec![RoutePath::root()];
        let inventory = Inventory::new();
        let ctx = ReportContext {
            source: &source,
            routes: &routes,
            inventory: &inventory,
            viewports: &[],
        };
        let text = render(&ctx, None);
        assert!(text.contains("Skipped (`--skip-parity`)"));
        assert!(text.contains("No assets were localized."));
        assert!(!text.contains("| Route |"));
    }
}
