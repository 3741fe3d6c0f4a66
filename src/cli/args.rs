//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Clone a Framer site into a static, deployable bundle
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: ./clone.toml when present)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Discover, capture, localize, emit deploy config and verify parity
    #[command(visible_alias = "c")]
    Clone {
        /// Framer site URL (e.g. https://my-site.framer.website/)
        #[arg(value_hint = clap::ValueHint::Url)]
        url: String,

        #[command(flatten)]
        output: OutputArgs,

        /// Local preview port (also written to serve.sh)
        #[arg(short, long)]
        port: Option<u16>,

        /// Skip screenshot comparison
        #[arg(long, visible_alias = "skip-screenshots")]
        skip_parity: bool,

        /// Exit non-zero when any asset could not be localized
        #[arg(long)]
        strict_assets: bool,

        /// Enable verbose output for debugging
        #[arg(short = 'V', long)]
        verbose: bool,
    },

    /// Re-localize assets and rewrite public/ from an existing capture
    #[command(visible_alias = "l")]
    Localize {
        #[command(flatten)]
        output: OutputArgs,

        /// Exit non-zero when any asset could not be localized
        #[arg(long)]
        strict_assets: bool,

        /// Enable verbose output for debugging
        #[arg(short = 'V', long)]
        verbose: bool,
    },

    /// Re-run the parity check against an existing bundle
    #[command(visible_alias = "v")]
    Verify {
        #[command(flatten)]
        output: OutputArgs,

        /// Local preview port
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable verbose output for debugging
        #[arg(short = 'V', long)]
        verbose: bool,
    },

    /// Serve the bundle locally
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        output: OutputArgs,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Output root shared by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output directory (public/, capture/, parity/ and reports live here)
    #[arg(
        short = 'o',
        long = "output-dir",
        visible_alias = "output",
        default_value = ".",
        value_hint = clap::ValueHint::DirPath
    )]
    pub dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_args() {
        let cli = Cli::parse_from([
            "framer-clone",
            "clone",
            "https://site.framer.website/",
            "--output-dir",
            "./my-clone",
            "--port",
            "9000",
            "--skip-screenshots",
        ]);
        let Commands::Clone {
            url,
            output,
            port,
            skip_parity,
            strict_assets,
            ..
        } = cli.command
        else {
            panic!("expected clone");
        };
        assert_eq!(url, "https://site.framer.website/");
        assert_eq!(output.dir, PathBuf::from("./my-clone"));
        assert_eq!(port, Some(9000));
        assert!(skip_parity);
        assert!(!strict_assets);
    }

    #[test]
    fn test_aliases_and_global_config() {
        let cli = Cli::parse_from(["framer-clone", "s", "-p", "3000", "-C", "x.toml"]);
        assert!(matches!(cli.command, Commands::Serve { port: Some(3000), .. }));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn test_clone_requires_url() {
        assert!(Cli::try_parse_from(["framer-clone", "clone"]).is_err());
    }

    #[test]
    fn test_verify_defaults_to_cwd() {
        let cli = Cli::parse_from(["framer-clone", "verify"]);
        let Commands::Verify { output, port, .. } = cli.command else {
            panic!("expected verify");
        };
        assert_eq!(output.dir, PathBuf::from("."));
        assert_eq!(port, None);
    }
}
