//! Command line interface for the release pipeline.

mod args;

pub use args::{Args, Command};

use std::path::PathBuf;
use std::sync::Arc;

use crate::build::CargoToolchain;
use crate::checksum::DigestAlgorithm;
use crate::config::ReleaseConfig;
use crate::error::Result;
use crate::manifest::{self, ManifestJob};
use crate::release::{Coordinator, FsReleaseStore, GitHubReleaseStore, ReleaseStore};
use crate::report::{EXIT_SUCCESS, RunReport};

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();

    match args.command {
        Command::Run {
            version,
            config,
            output_dir,
            repo,
            token,
            dry_run,
        } => {
            let version = parse_version(&version)?;
            let config = match config {
                Some(path) => ReleaseConfig::load(&path)?,
                None => ReleaseConfig::default(),
            };

            match (repo, dry_run) {
                (Some(repo), false) => {
                    let token = token.ok_or_else(|| {
                        anyhow::anyhow!("--repo requires a token (set GITHUB_TOKEN or --token)")
                    })?;
                    let store = GitHubReleaseStore::new(&repo, token)?;
                    run_release(store, config, &version, output_dir).await
                }
                _ => {
                    let store = FsReleaseStore::new(output_dir.join("release"));
                    run_release(store, config, &version, output_dir).await
                }
            }
        }

        Command::RenderManifest {
            version,
            template,
            output,
            algorithm,
            artifacts,
        } => {
            let version = parse_version(&version)?;
            let algorithm: DigestAlgorithm = algorithm.parse()?;

            let job = ManifestJob {
                ecosystem: None,
                template_path: template,
                output_path: output,
                algorithm,
                sources: artifacts,
            };
            let path = manifest::generate(&job, &version).await?;
            println!("{}", path.display());
            Ok(EXIT_SUCCESS)
        }
    }
}

/// Runs a coordinated release against the chosen store and prints the report.
async fn run_release<S: ReleaseStore>(
    store: S,
    config: ReleaseConfig,
    version: &str,
    output_dir: PathBuf,
) -> Result<i32> {
    config.validate()?;

    let workspace = std::env::current_dir()?;
    let toolchain = CargoToolchain::new(workspace);
    let target_root = toolchain.target_root();

    let coordinator = Coordinator::new(store, Arc::new(toolchain), config, target_root, output_dir);
    let (record, report) = coordinator.run(version).await?;

    print_report(&record.version, &report);
    Ok(report.exit_code())
}

fn print_report(version: &str, report: &RunReport) {
    log::debug!("run report for {version} complete");
    print!("{}", report.render());
}

/// Validates and normalizes the version argument; a leading `v` is accepted
/// and stripped so tags and bare versions behave the same.
fn parse_version(raw: &str) -> Result<String> {
    let trimmed = raw.strip_prefix('v').unwrap_or(raw);
    let version = semver::Version::parse(trimmed)?;
    Ok(version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_accepts_tag_prefix() {
        assert_eq!(parse_version("v1.2.3").unwrap(), "1.2.3");
        assert_eq!(parse_version("1.2.3").unwrap(), "1.2.3");
        assert!(parse_version("not-a-version").is_err());
    }
}
