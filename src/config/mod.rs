//! Run configuration from the optional `clone.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [capture] [assets] [parity] [serve] [deploy]
//! ├── error.rs       # ConfigError, ConfigDiagnostics
//! ├── paths.rs       # OutputPaths (output directory layout)
//! └── mod.rs         # CloneConfig (this file)
//! ```
//!
//! Every field has a default, so running without a config file is the common
//! case. CLI flags override file values.

mod error;
mod paths;
pub mod section;

pub use error::{ConfigDiagnostics, ConfigError};
pub use paths::OutputPaths;
pub use section::{AssetsConfig, CaptureConfig, DeployConfig, ParityConfig, ServeConfig};

use crate::{
    cli::{Cli, Commands},
    log,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Config file looked up in the working directory when `-C` is not given.
pub const DEFAULT_CONFIG_NAME: &str = "clone.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing clone.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloneConfig {
    /// Config file the values came from, if any (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Output root for the current command (internal use only)
    #[serde(skip)]
    pub output: PathBuf,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default)]
    pub parity: ParityConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub deploy: DeployConfig,
}

impl CloneConfig {
    /// Load configuration for the parsed command line.
    ///
    /// An explicit `-C` path must exist; the implicit `clone.toml` is optional.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match Self::resolve_config_path(cli)? {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.config_path = Some(path);
                config
            }
            None => Self::default(),
        };

        config.apply_command_options(cli);
        config.validate()?;
        Ok(config)
    }

    /// Resolve which config file to read, if any.
    fn resolve_config_path(cli: &Cli) -> Result<Option<PathBuf>> {
        if let Some(path) = &cli.config {
            if !path.is_file() {
                return Err(ConfigError::Io(
                    path.clone(),
                    std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
                )
                .into());
            }
            return Ok(Some(path.clone()));
        }

        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let implicit = cwd.join(DEFAULT_CONFIG_NAME);
        Ok(implicit.is_file().then_some(implicit))
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Output layout for the configured root.
    pub fn paths(&self) -> OutputPaths<'_> {
        OutputPaths::new(&self.output)
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        match &cli.command {
            Commands::Clone {
                output,
                port,
                skip_parity,
                strict_assets,
                verbose,
                ..
            } => {
                crate::logger::set_verbose(*verbose);
                self.output = output.dir.clone();
                Self::update_option(&mut self.serve.port, port.as_ref());
                if *skip_parity {
                    self.parity.enable = false;
                }
                if *strict_assets {
                    self.assets.strict = true;
                }
            }
            Commands::Localize {
                output,
                strict_assets,
                verbose,
            } => {
                crate::logger::set_verbose(*verbose);
                self.output = output.dir.clone();
                if *strict_assets {
                    self.assets.strict = true;
                }
            }
            Commands::Verify {
                output,
                port,
                verbose,
            } => {
                crate::logger::set_verbose(*verbose);
                self.output = output.dir.clone();
                Self::update_option(&mut self.serve.port, port.as_ref());
            }
            Commands::Serve {
                output,
                interface,
                port,
            } => {
                self.output = output.dir.clone();
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
            }
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate all sections, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.capture.validate(&mut diag);
        self.assets.validate(&mut diag);
        self.parity.validate(&mut diag);
        self.serve.validate(&mut diag);
        self.deploy.validate(&mut diag);

        if self.output.is_file() {
            diag.error(
                "output",
                format!("{} is a file, not a directory", self.output.display()),
            );
        }

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> CloneConfig {
    let (parsed, ignored) = CloneConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

/// Default config rooted at `output`, with short timings for tests.
#[cfg(test)]
pub fn test_config(output: &Path) -> CloneConfig {
    let mut config = CloneConfig {
        output: output.to_path_buf(),
        ..CloneConfig::default()
    };
    config.capture.settle_ms = 0;
    config.capture.timeout_secs = 2;
    config.assets.timeout_secs = 2;
    config.assets.retries = 0;
    config.parity.settle_ms = 0;
    config.parity.timeout_secs = 2;
    config
}

// ============================================================================
// tests
// ============================================================================
