//! Per-target build execution.
//!
//! A [`BuildExecutor`] runs one cell of the target matrix: compile through
//! the [`Toolchain`], strip symbols when the target supports it, collect
//! auxiliary build outputs (shell completions), and bundle everything into
//! a single uploadable archive. Executors share no mutable state, so the
//! coordinator can run any number of them in parallel.

pub mod archive;
pub mod toolchain;

pub use toolchain::{CargoToolchain, Toolchain};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::TargetSpec;

/// Errors from a single target build.
///
/// Each variant is fatal for its matrix cell only; other cells continue.
/// Strip failures are deliberately not here: an unstrippable binary ships
/// unstripped with a warning.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Compiler invocation failed; carries the compiler diagnostics.
    #[error("compilation failed for {triple}: {diagnostics}")]
    Compile { triple: String, diagnostics: String },

    /// Strip invocation failed; callers ship the binary unstripped.
    #[error("strip failed for {triple}: {diagnostics}")]
    Strip { triple: String, diagnostics: String },

    /// Archive creation failed.
    #[error("archive creation failed: {0}")]
    Bundle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A built, bundled, uploadable output for one target.
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    /// The matrix cell this artifact was built for.
    pub target: TargetSpec,

    /// Compiled (and possibly stripped) binary.
    pub binary_path: PathBuf,

    /// Auxiliary files bundled alongside the binary, in sorted order.
    pub aux_files: Vec<PathBuf>,

    /// Upload name, deterministic in (product, version, triple).
    pub asset_name: String,

    /// Bundled archive on disk.
    pub archive_path: PathBuf,
}

/// Runs one platform/target build end to end.
pub struct BuildExecutor<T> {
    toolchain: Arc<T>,
    product: String,
    version: String,
    /// Cargo target root, scanned for completion-script side outputs.
    target_root: PathBuf,
    /// Directory the bundled archive is written to.
    out_dir: PathBuf,
}

impl<T: Toolchain> BuildExecutor<T> {
    pub fn new(
        toolchain: Arc<T>,
        product: impl Into<String>,
        version: impl Into<String>,
        target_root: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            toolchain,
            product: product.into(),
            version: version.into(),
            target_root: target_root.into(),
            out_dir: out_dir.into(),
        }
    }

    /// Builds `target` and bundles the result.
    ///
    /// Compiles via the toolchain (native or `cross`), strips symbols when
    /// the target's capability flag allows it, collects completion scripts
    /// emitted as a build side channel, and writes the archive (zip for
    /// Windows targets, tar+gzip otherwise) into the output directory.
    pub async fn build(&self, target: &TargetSpec) -> Result<BuildArtifact, BuildError> {
        log::info!("building {} for {}", self.product, target.triple);

        let binary_path = self.toolchain.compile(target, &self.product).await?;

        if target.strip {
            if let Err(err) = self.toolchain.strip(&binary_path, target).await {
                log::warn!("{err}; shipping unstripped binary");
            }
        } else {
            log::warn!(
                "symbol stripping unavailable for {}, shipping unstripped binary",
                target.triple
            );
        }

        let aux_files = collect_completions(&self.target_root, &target.triple).await?;
        if !aux_files.is_empty() {
            log::debug!(
                "collected {} auxiliary file(s) for {}",
                aux_files.len(),
                target.triple
            );
        }

        let asset_name = target.asset_name(&self.product, &self.version);
        let archive_path = self.out_dir.join(&asset_name);

        let mut entries = vec![(
            binary_path.clone(),
            format!("{}{}", self.product, target.os.binary_suffix()),
        )];
        for aux in &aux_files {
            let name = aux
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| BuildError::Bundle(format!("auxiliary file has no name: {}", aux.display())))?;
            entries.push((aux.clone(), format!("completion/{name}")));
        }

        archive::bundle(target.os.archive_format(), &archive_path, entries).await?;

        log::info!("✓ Bundled {}: {}", target.triple, archive_path.display());
        Ok(BuildArtifact {
            target: target.clone(),
            binary_path,
            aux_files,
            asset_name,
            archive_path,
        })
    }
}

/// Collects shell completion scripts emitted under the build output.
///
/// The application's build script writes completions into a `completion`
/// directory somewhere under `target/<triple>/release/build`. Results are
/// sorted so archive contents are deterministic. A missing build directory
/// yields no auxiliary files rather than an error.
async fn collect_completions(target_root: &Path, triple: &str) -> Result<Vec<PathBuf>, BuildError> {
    let build_dir = target_root.join(triple).join("release").join("build");
    if !build_dir.is_dir() {
        return Ok(Vec::new());
    }

    tokio::task::spawn_blocking(move || {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&build_dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path()
                        .parent()
                        .and_then(|p| p.file_name())
                        .is_some_and(|n| n == "completion")
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();
        Ok(files)
    })
    .await
    .map_err(|e| BuildError::Bundle(format!("completion scan task panicked: {e}")))?
}
