//! End-of-run summary.
//!
//! Every release run produces a report enumerating which targets built,
//! which failed, and which manifests were generated versus skipped, so a
//! human can decide whether to publish the draft release. The report also
//! decides the process exit code.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Exit code for a fully successful run.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for a fatal coordination error (release record creation failed).
pub const EXIT_FATAL: i32 = 1;
/// Exit code when the run completed but targets or manifests failed or
/// were skipped.
pub const EXIT_PARTIAL: i32 = 2;

/// Terminal state of one target matrix cell.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetStatus {
    Built { asset_name: String, uploaded: bool },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    pub triple: String,
    #[serde(flatten)]
    pub status: TargetStatus,
}

/// Terminal state of one ecosystem manifest job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ManifestStatus {
    Generated { path: PathBuf, uploaded: bool },
    /// Required artifacts never reached the pool; the ecosystem is skipped,
    /// not failed.
    Skipped { missing: Vec<String> },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: ManifestStatus,
}

/// Summary of one coordinated release run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub version: String,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub targets: Vec<TargetOutcome>,
    pub manifests: Vec<ManifestOutcome>,
}

impl RunReport {
    /// True when every target built and uploaded and every manifest was
    /// generated and uploaded.
    pub fn is_clean(&self) -> bool {
        let targets_ok = self
            .targets
            .iter()
            .all(|t| matches!(t.status, TargetStatus::Built { uploaded: true, .. }));
        let manifests_ok = self
            .manifests
            .iter()
            .all(|m| matches!(m.status, ManifestStatus::Generated { uploaded: true, .. }));
        targets_ok && manifests_ok
    }

    /// Process exit code for this run: 0 clean, 2 partial.
    pub fn exit_code(&self) -> i32 {
        if self.is_clean() {
            EXIT_SUCCESS
        } else {
            EXIT_PARTIAL
        }
    }

    /// Human-readable summary, one line per target and manifest.
    pub fn render(&self) -> String {
        let built = self
            .targets
            .iter()
            .filter(|t| matches!(t.status, TargetStatus::Built { .. }))
            .count();
        let generated = self
            .manifests
            .iter()
            .filter(|m| matches!(m.status, ManifestStatus::Generated { .. }))
            .count();

        let mut out = String::new();
        let _ = writeln!(
            out,
            "release {}: {built}/{} targets built, {generated}/{} manifests generated",
            self.version,
            self.targets.len(),
            self.manifests.len()
        );

        let _ = writeln!(out, "targets:");
        for target in &self.targets {
            match &target.status {
                TargetStatus::Built {
                    asset_name,
                    uploaded: true,
                } => {
                    let _ = writeln!(out, "  ✓ {}  {asset_name}", target.triple);
                }
                TargetStatus::Built {
                    asset_name,
                    uploaded: false,
                } => {
                    let _ = writeln!(out, "  ! {}  {asset_name} (upload failed)", target.triple);
                }
                TargetStatus::Failed { reason } => {
                    let _ = writeln!(out, "  ✗ {}  {}", target.triple, first_line(reason));
                }
            }
        }

        let _ = writeln!(out, "manifests:");
        for manifest in &self.manifests {
            match &manifest.status {
                ManifestStatus::Generated {
                    path,
                    uploaded: true,
                } => {
                    let _ = writeln!(out, "  ✓ {}  {}", manifest.name, path.display());
                }
                ManifestStatus::Generated {
                    path,
                    uploaded: false,
                } => {
                    let _ = writeln!(
                        out,
                        "  ! {}  {} (upload failed)",
                        manifest.name,
                        path.display()
                    );
                }
                ManifestStatus::Skipped { missing } => {
                    let _ = writeln!(
                        out,
                        "  - {} skipped (missing: {})",
                        manifest.name,
                        missing.join(", ")
                    );
                }
                ManifestStatus::Failed { reason } => {
                    let _ = writeln!(out, "  ✗ {}  {}", manifest.name, first_line(reason));
                }
            }
        }

        out
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}
