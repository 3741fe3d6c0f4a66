//! Visual parity check between the source site and the local clone.
//!
//! The bundle is served on the preview port, then every route is screenshot
//! from both origins for each configured viewport and scored with
//! [`diff::compare`]. A failed comparison is recorded and the rest continue.

pub mod diff;
pub mod report;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::asset::Inventory;
use crate::browser::{BrowserError, PageWait, Renderer, Viewport};
use crate::cli::serve::PreviewServer;
use crate::config::{CloneConfig, OutputPaths};
use crate::core::RoutePath;
use crate::summary::{Failure, Phase};
use crate::utils::path::{display_relative, recreate_dir, write_file};
use crate::utils::plural_count;
use crate::{debug, log};

use report::ReportContext;

/// Score for one route at one viewport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParityResult {
    pub route: RoutePath,
    pub viewport: String,
    /// Similarity in percent (0-100).
    pub score: f64,
    pub dimension_mismatch: bool,
    /// Paths relative to the output root.
    pub source: String,
    pub local: String,
    pub diff: String,
}

#[derive(Debug, Default)]
pub struct ParityOutcome {
    pub results: Vec<ParityResult>,
    pub failures: Vec<Failure>,
}

impl ParityOutcome {
    /// Lowest score across all comparisons.
    pub fn worst(&self) -> Option<&ParityResult> {
        self.results
            .iter()
            .min_by(|a, b| a.score.total_cmp(&b.score))
    }
}

#[derive(Debug, Error)]
enum ComparisonError {
    #[error("source screenshot failed: {0}")]
    Source(BrowserError),

    #[error("clone screenshot failed: {0}")]
    Clone(BrowserError),

    #[error("cannot decode {0} screenshot: {1}")]
    Decode(&'static str, image::ImageError),

    #[error("invalid route URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Compare every route of the bundle against `source` and write the report.
pub async fn verify<R: Renderer>(
    source: &Url,
    routes: &[RoutePath],
    inventory: &Inventory,
    renderer: &R,
    config: &CloneConfig,
) -> Result<ParityOutcome> {
    let paths = config.paths();
    let parity = &config.parity;

    recreate_dir(&paths.parity_dir())?;
    let preview = PreviewServer::start(
        &paths.public_dir(),
        config.serve.interface,
        config.serve.port,
    )
    .context("failed to start the preview server")?;

    log!(
        "parity";
        "comparing {} at {} against {}",
        plural_count(routes.len(), "route"),
        plural_count(parity.viewports.len(), "viewport"),
        preview.url()
    );

    let wait = PageWait::for_parity(parity, &config.capture);
    let mut outcome = ParityOutcome::default();

    for route in routes {
        for viewport in &parity.viewports {
            let key = format!("{route}@{}", viewport.name);
            let shot = Shot {
                route,
                viewport,
                wait: &wait,
            };

            match shot.run(renderer, source, preview.url(), &paths, config).await? {
                Ok(result) => {
                    log!(
                        "parity";
                        "{} [{}] {} {:.2}%",
                        route,
                        viewport.name,
                        report::verdict(result.score),
                        result.score
                    );
                    outcome.results.push(result);
                }
                Err(e) => {
                    log!("error"; "{key}: {e}");
                    outcome.failures.push(Failure::new(Phase::Parity, key, e));
                }
            }
        }
    }
    drop(preview);

    let json = serde_json::to_string_pretty(&outcome.results)?;
    write_file(&paths.parity_results(), json + "\n")?;

    let ctx = ReportContext {
        source,
        routes,
        inventory,
        viewports: &parity.viewports,
    };
    write_report(&paths, &ctx, Some((&outcome.results, &outcome.failures)))?;

    if let Some(worst) = outcome.worst() {
        log!(
            "parity";
            "{} compared, lowest {:.2}% ({}@{})",
            outcome.results.len(),
            worst.score,
            worst.route,
            worst.viewport
        );
    }
    Ok(outcome)
}

/// Write `PARITY_REPORT.md` without comparisons, for `--skip-parity` runs.
pub fn write_skipped_report(
    config: &CloneConfig,
    source: &Url,
    routes: &[RoutePath],
    inventory: &Inventory,
) -> Result<()> {
    let ctx = ReportContext {
        source,
        routes,
        inventory,
        viewports: &config.parity.viewports,
    };
    write_report(&config.paths(), &ctx, None)
}

fn write_report(
    paths: &OutputPaths,
    ctx: &ReportContext,
    comparisons: Option<(&[ParityResult], &[Failure])>,
) -> Result<()> {
    let path = paths.parity_report();
    write_file(&path, report::render(ctx, comparisons))?;
    debug!("parity"; "wrote {}", display_relative(&path, paths.root()));
    Ok(())
}

/// One route at one viewport.
struct Shot<'a> {
    route: &'a RoutePath,
    viewport: &'a Viewport,
    wait: &'a PageWait,
}

impl Shot<'_> {
    /// Screenshot both sides and score them.
    ///
    /// The outer error is fatal (output not writable); the inner one only
    /// fails this comparison.
    async fn run<R: Renderer>(
        &self,
        renderer: &R,
        source: &Url,
        local: &Url,
        paths: &OutputPaths<'_>,
        config: &CloneConfig,
    ) -> Result<Result<ParityResult, ComparisonError>> {
        let (source_url, local_url) = match (self.route.to_url(source), self.route.to_url(local)) {
            (Ok(s), Ok(l)) => (s, l),
            (Err(e), _) | (_, Err(e)) => return Ok(Err(e.into())),
        };

        let (source_png, local_png) = tokio::join!(
            renderer.screenshot(&source_url, self.viewport, self.wait),
            renderer.screenshot(&local_url, self.viewport, self.wait),
        );

        let dir = paths.screenshot_dir(self.route, &self.viewport.name);
        let source_path = dir.join("source.png");
        let local_path = dir.join("local.png");
        if let Ok(png) = &source_png {
            write_file(&source_path, png)?;
        }
        if let Ok(png) = &local_png {
            write_file(&local_path, png)?;
        }

        let (source_png, local_png) = match (source_png, local_png) {
            (Ok(s), Ok(l)) => (s, l),
            (Err(e), _) => return Ok(Err(ComparisonError::Source(e))),
            (_, Err(e)) => return Ok(Err(ComparisonError::Clone(e))),
        };

        let source_img = match diff::decode_png(&source_png) {
            Ok(img) => img,
            Err(e) => return Ok(Err(ComparisonError::Decode("source", e))),
        };
        let local_img = match diff::decode_png(&local_png) {
            Ok(img) => img,
            Err(e) => return Ok(Err(ComparisonError::Decode("clone", e))),
        };

        let comparison = diff::compare(&source_img, &local_img, config.parity.threshold);
        let diff_path = paths.diff_image(self.route, &self.viewport.name);
        if let Some(parent) = diff_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        comparison
            .diff
            .save_with_format(&diff_path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write {}", diff_path.display()))?;

        debug!(
            "parity";
            "{}@{}: {} of {} pixels differ",
            self.route,
            self.viewport.name,
            comparison.differing,
            comparison.total
        );

        Ok(Ok(ParityResult {
            route: self.route.clone(),
            viewport: self.viewport.name.clone(),
            score: comparison.score,
            dimension_mismatch: comparison.dimension_mismatch,
            source: display_relative(&source_path, paths.root()),
            local: display_relative(&local_path, paths.root()),
            diff: display_relative(&diff_path, paths.root()),
        }))
    }
}
