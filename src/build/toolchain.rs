//! External compiler and strip toolchain.
//!
//! The toolchain is a collaborator, not part of this crate's logic: its
//! only contract is "produce a binary at a known path, or fail with a
//! diagnostic". It sits behind a trait so the coordinator's fan-out and
//! fan-in can be exercised without invoking a real compiler.

use std::future::Future;
use std::path::{Path, PathBuf};

use super::BuildError;
use crate::config::TargetSpec;

/// Compile and strip operations for one target.
pub trait Toolchain: Send + Sync {
    /// Compiles `product` for `target`, returning the path to the binary.
    ///
    /// Fails with [`BuildError::Compile`] carrying the compiler diagnostics.
    fn compile(
        &self,
        target: &TargetSpec,
        product: &str,
    ) -> impl Future<Output = Result<PathBuf, BuildError>> + Send;

    /// Strips debug symbols from `binary` in place.
    ///
    /// Callers treat failure as degraded-but-continue: the binary ships
    /// unstripped and a warning is logged.
    fn strip(
        &self,
        binary: &Path,
        target: &TargetSpec,
    ) -> impl Future<Output = Result<(), BuildError>> + Send;
}

/// Real toolchain: `cargo build --release` per target, with the `cross`
/// shim for targets flagged as cross-compiled.
pub struct CargoToolchain {
    workspace: PathBuf,
}

impl CargoToolchain {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    /// Cargo target root under the workspace.
    pub fn target_root(&self) -> PathBuf {
        self.workspace.join("target")
    }
}

impl Toolchain for CargoToolchain {
    async fn compile(&self, target: &TargetSpec, product: &str) -> Result<PathBuf, BuildError> {
        let tool = if target.cross { "cross" } else { "cargo" };
        log::debug!("{tool} build --release --target {}", target.triple);

        let output = tokio::process::Command::new(tool)
            .args(["build", "--release", "--locked", "--target", &target.triple])
            .current_dir(&self.workspace)
            .output()
            .await
            .map_err(|e| BuildError::Compile {
                triple: target.triple.clone(),
                diagnostics: format!("failed to invoke {tool}: {e}"),
            })?;

        if !output.status.success() {
            return Err(BuildError::Compile {
                triple: target.triple.clone(),
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let binary = self
            .target_root()
            .join(&target.triple)
            .join("release")
            .join(format!("{product}{}", target.os.binary_suffix()));

        if !tokio::fs::try_exists(&binary).await.unwrap_or(false) {
            return Err(BuildError::Compile {
                triple: target.triple.clone(),
                diagnostics: format!("build succeeded but no binary at {}", binary.display()),
            });
        }

        Ok(binary)
    }

    async fn strip(&self, binary: &Path, target: &TargetSpec) -> Result<(), BuildError> {
        let strip_tool = which::which("strip").map_err(|e| BuildError::Strip {
            triple: target.triple.clone(),
            diagnostics: format!("strip tool not found: {e}"),
        })?;

        let output = tokio::process::Command::new(strip_tool)
            .arg(binary)
            .output()
            .await
            .map_err(|e| BuildError::Strip {
                triple: target.triple.clone(),
                diagnostics: format!("failed to invoke strip: {e}"),
            })?;

        if !output.status.success() {
            return Err(BuildError::Strip {
                triple: target.triple.clone(),
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}
