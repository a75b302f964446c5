//! Command line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Release pipeline for the gauge system monitor
#[derive(Parser, Debug)]
#[command(
    name = "gauge-release",
    version,
    about = "Release pipeline for the gauge system monitor",
    long_about = "Drives parallel cross-platform builds from a single version tag, collects \
artifacts into a release, and renders per-ecosystem package manifests (installer script, AUR \
recipes, winget manifest, Chocolatey script, Homebrew formula) from templates.

Exit codes: 0 = all targets attempted and all scheduled manifests generated, 1 = fatal \
coordination error, 2 = run completed with failed or skipped targets/manifests."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive a full release: fan out builds, collect artifacts, render manifests
    Run {
        /// Release version (semantic, e.g. 1.2.3; a leading 'v' is accepted)
        version: String,

        /// Release configuration file (TOML); defaults to the built-in matrix
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Directory archives, manifests, and the run report are written under
        #[arg(long, value_name = "DIR", default_value = "target/release-out")]
        output_dir: PathBuf,

        /// GitHub repository to publish the draft release to
        #[arg(long, value_name = "OWNER/REPO")]
        repo: Option<String>,

        /// GitHub API token, used when --repo is given
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Keep the release local: write everything to the output directory
        /// instead of publishing
        #[arg(long)]
        dry_run: bool,
    },

    /// Render a single ecosystem manifest from a template and artifact checksums
    RenderManifest {
        /// Release version substituted for {version}
        version: String,

        /// Template file with {version} / {sha256}-style placeholders
        template: PathBuf,

        /// Where the rendered manifest is written
        output: PathBuf,

        /// Digest algorithm: sha256 or sha512
        algorithm: String,

        /// Artifact archives, in placeholder order ({sha256_1}, {sha256_2}, ...)
        #[arg(required = true)]
        artifacts: Vec<PathBuf>,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
