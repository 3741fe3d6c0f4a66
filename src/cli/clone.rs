//! `clone`, `localize` and `verify` orchestration.
//!
//! Phases run in order and hand results to each other through the output
//! directory, so `localize` and `verify` can resume from an earlier `clone`.

use anyhow::{Context, Result, bail};
use url::Url;

use crate::asset::{self, Category, LocalizeOutcome, bucket_totals};
use crate::browser::{ChromeRenderer, Renderer};
use crate::capture::{self, CaptureManifest};
use crate::config::CloneConfig;
use crate::core::{RoutePath, parse_site_url};
use crate::deploy;
use crate::discover::discover;
use crate::parity;
use crate::summary::{Phase, RunSummary};
use crate::utils::http;
use crate::utils::path::display_relative;
use crate::utils::plural_count;
use crate::{debug, log};

/// Full pipeline: discover, capture, localize, deploy files and parity.
pub async fn clone_site(url: &str, config: &CloneConfig) -> Result<RunSummary> {
    let origin = parse_site_url(url).with_context(|| format!("invalid site URL `{url}`"))?;
    std::fs::create_dir_all(&config.output)
        .with_context(|| format!("cannot create output dir {}", config.output.display()))?;
    log!("clone"; "{} -> {}", origin, config.output.display());

    let renderer = launch(config).await?;
    let result = run_pipeline(&origin, &renderer, config).await;
    renderer.close().await;
    result
}

/// Re-run localization and deploy files from an existing capture.
pub async fn localize_bundle(config: &CloneConfig) -> Result<RunSummary> {
    let paths = config.paths();
    let manifest = CaptureManifest::load(&paths)?;
    let pages = manifest.read_pages(&paths)?;

    let mut summary = RunSummary::new(manifest.source.as_str());
    summary.count("routes", manifest.routes.len());
    summary.count("pages", pages.len());
    summary.extend(manifest.failed.iter().cloned());

    let localized = asset::localize(&pages, &manifest.source, config).await?;
    let routes: Vec<RoutePath> = pages.iter().map(|p| p.route.clone()).collect();
    record_assets(&mut summary, &localized);
    deploy::emit(config, &manifest.source, &routes, &localized.inventory)?;
    summary.extend(localized.failures);
    Ok(summary)
}

/// Re-run the parity check against the existing bundle.
pub async fn verify_bundle(config: &CloneConfig) -> Result<RunSummary> {
    let paths = config.paths();
    let manifest = CaptureManifest::load(&paths)?;
    if !paths.public_dir().is_dir() {
        bail!(
            "no bundle at {} (run `localize` first)",
            display_relative(&paths.public_dir(), paths.root())
        );
    }
    let inventory = asset::load_inventory(&paths)?;
    let routes: Vec<RoutePath> = manifest.pages.iter().map(|p| p.route.clone()).collect();

    let renderer = launch(config).await?;
    let result = parity::verify(&manifest.source, &routes, &inventory, &renderer, config).await;
    renderer.close().await;

    let outcome = result?;
    let mut summary = RunSummary::new(manifest.source.as_str());
    summary.count("comparisons", outcome.results.len());
    summary.extend(outcome.failures);
    Ok(summary)
}

/// Print and persist the summary, then apply `--strict-assets`.
pub fn finish(summary: &RunSummary, config: &CloneConfig) -> Result<()> {
    let paths = config.paths();
    summary.write(&paths.summary())?;
    summary.print();
    log!("done"; "{}", summary);

    let failed_assets = summary.failures_in(Phase::Assets);
    if config.assets.strict && failed_assets > 0 {
        bail!(
            "{} could not be localized (--strict-assets)",
            plural_count(failed_assets, "asset")
        );
    }
    Ok(())
}

async fn launch(config: &CloneConfig) -> Result<ChromeRenderer> {
    debug!("browser"; "launching headless Chromium");
    ChromeRenderer::launch(&config.capture)
        .await
        .context("cannot start the browser (set [capture] chrome_path?)")
}

async fn run_pipeline<R: Renderer>(
    origin: &Url,
    renderer: &R,
    config: &CloneConfig,
) -> Result<RunSummary> {
    let client = http::build_client(&config.capture.user_agent, config.capture.timeout())?;
    let routes = discover(origin, renderer, &client, &config.capture).await?;

    let mut summary = RunSummary::new(origin.as_str());
    summary.count("routes", routes.len());
    summary.count("excluded_links", routes.excluded().len());

    let captured = capture::capture(&routes, renderer, config).await?;
    summary.count("pages", captured.pages.len());
    summary.extend(captured.failures);

    let localized = asset::localize(&captured.pages, origin, config).await?;
    record_assets(&mut summary, &localized);

    let pages: Vec<RoutePath> = captured.pages.iter().map(|p| p.route.clone()).collect();
    deploy::emit(config, origin, &pages, &localized.inventory)?;
    summary.extend(localized.failures);

    if config.parity.enable {
        let outcome =
            parity::verify(origin, &pages, &localized.inventory, renderer, config).await?;
        summary.count("comparisons", outcome.results.len());
        summary.extend(outcome.failures);
    } else {
        log!("parity"; "skipped");
        parity::write_skipped_report(config, origin, &pages, &localized.inventory)?;
    }

    Ok(summary)
}

fn record_assets(summary: &mut RunSummary, localized: &LocalizeOutcome) {
    for category in Category::ALL {
        let count = localized
            .inventory
            .get(&category)
            .map_or(0, |records| bucket_totals(records).0);
        summary.count(format!("assets.{category}"), count);
    }
    summary.count("downloads", localized.downloads);
    summary.count("residual_origin_refs", localized.residual);
}
