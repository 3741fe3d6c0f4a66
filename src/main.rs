//! framer-clone - Clone a Framer site into a static, deployable bundle.

mod asset;
mod browser;
mod capture;
mod cli;
mod config;
mod core;
mod deploy;
mod discover;
mod logger;
mod parity;
mod summary;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::CloneConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = CloneConfig::load(&cli)?;

    match &cli.command {
        Commands::Serve { .. } => cli::serve::serve_bundle(&config),
        Commands::Clone { url, .. } => {
            let summary = runtime()?.block_on(cli::clone::clone_site(url, &config))?;
            cli::clone::finish(&summary, &config)
        }
        Commands::Localize { .. } => {
            let summary = runtime()?.block_on(cli::clone::localize_bundle(&config))?;
            cli::clone::finish(&summary, &config)
        }
        Commands::Verify { .. } => {
            let summary = runtime()?.block_on(cli::clone::verify_bundle(&config))?;
            cli::clone::finish(&summary, &config)
        }
    }
}

/// Multi-threaded runtime for browser automation and downloads.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
