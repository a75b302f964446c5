//! Ecosystem manifest generation.
//!
//! Composes the checksum engine and template renderer: for each manifest
//! job, required digests are computed from the source archives, a
//! placeholder map is built, and the ecosystem template is rendered to its
//! output path. Writes exactly one file per job and mutates nothing else.
//!
//! # Placeholder contract
//!
//! - `{version}` — the release version string.
//! - `{sha256}` / `{sha512}` — the digest, for single-artifact ecosystems.
//! - `{sha256_1}`, `{sha256_2}`, ... — digests in artifact supply order,
//!   for multi-artifact ecosystems (e.g. the dual-architecture Homebrew
//!   formula). Same pattern for sha512.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checksum::{self, ChecksumError, DigestAlgorithm};
use crate::template::{self, PlaceholderMap, TemplateError};

/// Errors from manifest generation.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// A source artifact was absent at generation time.
    ///
    /// The coordinator's fan-in barrier guarantees artifacts exist before a
    /// job is scheduled, so this indicates the barrier was bypassed: a
    /// defect, not a recoverable condition.
    #[error("source artifact missing: {0} (fan-in barrier bypassed)")]
    MissingArtifact(PathBuf),

    /// A source artifact could not be checked for existence.
    #[error("failed to stat source artifact {path}: {source}")]
    SourceIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("checksum failed: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("template rendering failed: {0}")]
    Template(#[from] TemplateError),

    #[error("failed to read template {path}: {source}")]
    ReadTemplate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write manifest {path}: {source}")]
    WriteOutput {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Packaging ecosystem a manifest belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ecosystem {
    /// Debian installer script.
    Debian,
    /// AUR source recipe (PKGBUILD).
    Aur,
    /// AUR binary recipe (PKGBUILD for prebuilt archives).
    AurBinary,
    /// Windows Package Manager (winget) manifest.
    Winget,
    /// Chocolatey install script.
    Chocolatey,
    /// Homebrew formula.
    Homebrew,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ecosystem::Debian => "debian",
            Ecosystem::Aur => "aur",
            Ecosystem::AurBinary => "aur-binary",
            Ecosystem::Winget => "winget",
            Ecosystem::Chocolatey => "chocolatey",
            Ecosystem::Homebrew => "homebrew",
        };
        f.write_str(name)
    }
}

/// One manifest generation unit, consumed once.
#[derive(Debug, Clone)]
pub struct ManifestJob {
    /// Ecosystem this manifest targets; `None` for ad-hoc CLI renders.
    pub ecosystem: Option<Ecosystem>,

    /// Template file with placeholders.
    pub template_path: PathBuf,

    /// Destination for the rendered manifest.
    pub output_path: PathBuf,

    /// Digest algorithm for the source archives.
    pub algorithm: DigestAlgorithm,

    /// Archives whose digests fill the placeholders, in placeholder order.
    pub sources: Vec<PathBuf>,
}

impl ManifestJob {
    /// Human-readable label for logs and reports.
    pub fn label(&self) -> String {
        match self.ecosystem {
            Some(eco) => eco.to_string(),
            None => self
                .output_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.output_path.display().to_string()),
        }
    }
}

/// Builds the placeholder map for a manifest render.
///
/// Single-artifact jobs get one `{sha256}`-style entry; multi-artifact jobs
/// get numbered `{sha256_1}`, `{sha256_2}`, ... entries in supply order.
pub fn placeholder_map(
    version: &str,
    algorithm: DigestAlgorithm,
    digests: &[String],
) -> PlaceholderMap {
    let mut map = PlaceholderMap::new();
    map.insert("version".to_string(), version.to_string());

    let base = algorithm.placeholder_name();
    if let [digest] = digests {
        map.insert(base.to_string(), digest.clone());
    } else {
        for (i, digest) in digests.iter().enumerate() {
            map.insert(format!("{base}_{}", i + 1), digest.clone());
        }
    }
    map
}

/// Generates the manifest for `job`, returning the written output path.
///
/// All source archives must already exist; the fan-in barrier upstream
/// guarantees this, and a missing source is reported loudly as a defect.
pub async fn generate(job: &ManifestJob, version: &str) -> Result<PathBuf, ManifestError> {
    for source in &job.sources {
        match tokio::fs::try_exists(source).await {
            Ok(true) => {}
            Ok(false) => {
                log::error!(
                    "manifest '{}': source artifact {} missing at generation time; \
                     the fan-in barrier was bypassed",
                    job.label(),
                    source.display()
                );
                return Err(ManifestError::MissingArtifact(source.clone()));
            }
            Err(err) => {
                return Err(ManifestError::SourceIo {
                    path: source.clone(),
                    source: err,
                });
            }
        }
    }

    let mut digests = Vec::with_capacity(job.sources.len());
    for source in &job.sources {
        digests.push(checksum::digest(source, job.algorithm).await?);
    }

    let template_text = tokio::fs::read_to_string(&job.template_path)
        .await
        .map_err(|source| ManifestError::ReadTemplate {
            path: job.template_path.clone(),
            source,
        })?;

    let values = placeholder_map(version, job.algorithm, &digests);
    let rendered = template::render(&template_text, &values)?;

    if let Some(parent) = job.output_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ManifestError::WriteOutput {
                path: job.output_path.clone(),
                source,
            })?;
    }
    tokio::fs::write(&job.output_path, rendered)
        .await
        .map_err(|source| ManifestError::WriteOutput {
            path: job.output_path.clone(),
            source,
        })?;

    log::info!("✓ Generated {} manifest: {}", job.label(), job.output_path.display());
    Ok(job.output_path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn renders_single_artifact_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("gauge-1.2.3-x86_64-unknown-linux-gnu.tar.gz");
        write(&artifact, "hello");
        let template = dir.path().join("winget.tmpl");
        write(&template, "Version: {version}\nSha256: {sha256}\n");

        let job = ManifestJob {
            ecosystem: Some(Ecosystem::Winget),
            template_path: template,
            output_path: dir.path().join("out/gauge.yaml"),
            algorithm: DigestAlgorithm::Sha256,
            sources: vec![artifact],
        };

        let out = generate(&job, "1.2.3").await.unwrap();
        let rendered = std::fs::read_to_string(out).unwrap();
        assert_eq!(
            rendered,
            "Version: 1.2.3\n\
             Sha256: 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824\n"
        );
    }

    #[tokio::test]
    async fn dual_artifact_digests_keep_supply_order() {
        let dir = tempfile::tempdir().unwrap();
        let intel = dir.path().join("intel.tar.gz");
        let arm = dir.path().join("arm.tar.gz");
        write(&intel, "abc");
        write(&arm, "");
        let template = dir.path().join("homebrew.tmpl");
        write(&template, "{sha256_1} / {sha256_2}");

        let job = ManifestJob {
            ecosystem: Some(Ecosystem::Homebrew),
            template_path: template,
            output_path: dir.path().join("gauge.rb"),
            algorithm: DigestAlgorithm::Sha256,
            sources: vec![intel, arm],
        };

        let out = generate(&job, "1.2.3").await.unwrap();
        let rendered = std::fs::read_to_string(out).unwrap();
        assert_eq!(
            rendered,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad \
             / e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn missing_source_artifact_is_a_defect() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("t.tmpl");
        write(&template, "{version}");

        let job = ManifestJob {
            ecosystem: Some(Ecosystem::Debian),
            template_path: template,
            output_path: dir.path().join("out.sh"),
            algorithm: DigestAlgorithm::Sha256,
            sources: vec![dir.path().join("never-built.tar.gz")],
        };

        let err = generate(&job, "1.2.3").await.unwrap_err();
        assert!(matches!(err, ManifestError::MissingArtifact(_)));
        assert!(!job.output_path.exists(), "no output on failure");
    }

    #[tokio::test]
    async fn unstatable_source_is_an_io_error_not_a_barrier_defect() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("t.tmpl");
        write(&template, "{version}");
        // A path routed through a regular file fails the existence check
        // with ENOTDIR rather than reporting "not found".
        let blocker = dir.path().join("blocker");
        write(&blocker, "not a directory");

        let job = ManifestJob {
            ecosystem: Some(Ecosystem::Debian),
            template_path: template,
            output_path: dir.path().join("out.sh"),
            algorithm: DigestAlgorithm::Sha256,
            sources: vec![blocker.join("artifact.tar.gz")],
        };

        let err = generate(&job, "1.2.3").await.unwrap_err();
        assert!(matches!(err, ManifestError::SourceIo { .. }), "got {err}");
    }

    #[tokio::test]
    async fn unresolved_placeholder_produces_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("a.tar.gz");
        write(&artifact, "x");
        let template = dir.path().join("t.tmpl");
        write(&template, "{version} {sha512}");

        let job = ManifestJob {
            ecosystem: None,
            template_path: template,
            output_path: dir.path().join("out"),
            algorithm: DigestAlgorithm::Sha256,
            sources: vec![artifact],
        };

        let err = generate(&job, "1.2.3").await.unwrap_err();
        assert!(err.to_string().contains("sha512"));
        assert!(!job.output_path.exists(), "no output on failure");
    }
}
