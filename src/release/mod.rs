//! Release coordination.
//!
//! The [`Coordinator`] owns the run state machine: it creates the draft
//! release record, fans out one build task per target matrix cell, fans
//! completed artifacts into the shared pool behind a strict barrier, and
//! only then schedules manifest jobs for the ecosystems whose artifacts
//! all arrived. Build failures are soft: one target's failure never
//! cancels its siblings or the run.

pub mod github;
pub mod store;

pub use github::GitHubReleaseStore;
pub use store::{FsReleaseStore, ReleaseMeta, ReleaseRecord, ReleaseStore, StoreError};

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;

use crate::build::{BuildArtifact, BuildError, BuildExecutor, Toolchain};
use crate::config::{ArtifactKey, ReleaseConfig, TargetSpec};
use crate::error::Result;
use crate::manifest::{self, ManifestJob};
use crate::report::{ManifestOutcome, ManifestStatus, RunReport, TargetOutcome, TargetStatus};

/// Run state, advanced strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Record created, upload destination allocated.
    Draft,
    /// Build tasks in flight; cells complete in any order.
    Building,
    /// Every target reached a terminal state; pool is complete and frozen.
    ArtifactsReady,
    /// Manifest jobs running against the frozen pool.
    Packaging,
    /// Terminal; publishing the draft happens outside this core.
    Published,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Draft => "draft",
            RunState::Building => "building",
            RunState::ArtifactsReady => "artifacts-ready",
            RunState::Packaging => "packaging",
            RunState::Published => "published",
        };
        f.write_str(name)
    }
}

/// Shared pool of completed artifacts, keyed by triple + OS class.
///
/// Entries are create-once; the matrix design guarantees unique keys, so a
/// duplicate insert is a defect and is refused.
#[derive(Debug, Default)]
pub struct ArtifactPool {
    inner: HashMap<ArtifactKey, BuildArtifact>,
}

impl ArtifactPool {
    /// Registers an artifact. Returns false (and keeps the original) if the
    /// key is already occupied.
    pub fn insert(&mut self, artifact: BuildArtifact) -> bool {
        let key = artifact.target.key();
        match self.inner.entry(key) {
            std::collections::hash_map::Entry::Occupied(occupied) => {
                log::error!(
                    "duplicate artifact key {}: two targets were assigned the same asset key",
                    occupied.key()
                );
                false
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(artifact);
                true
            }
        }
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<&BuildArtifact> {
        self.inner.get(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &BuildArtifact> {
        self.inner.values()
    }
}

/// Drives one coordinated release run.
pub struct Coordinator<S, T> {
    store: S,
    toolchain: Arc<T>,
    config: ReleaseConfig,
    /// Cargo target root scanned for build side outputs.
    target_root: PathBuf,
    /// Directory archives and manifests are written under.
    out_dir: PathBuf,
}

impl<S: ReleaseStore, T: Toolchain + 'static> Coordinator<S, T> {
    pub fn new(
        store: S,
        toolchain: Arc<T>,
        config: ReleaseConfig,
        target_root: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            toolchain,
            config,
            target_root: target_root.into(),
            out_dir: out_dir.into(),
        }
    }

    /// Runs the full release for `version`.
    ///
    /// Only release record creation is fatal; per-target and per-manifest
    /// failures are isolated into the returned [`RunReport`].
    pub async fn run(&self, version: &str) -> Result<(ReleaseRecord, RunReport)> {
        let started = Utc::now();

        let record = self.store.create(version).await?;
        log::info!(
            "state {} -> {}: release {version}, {} targets",
            RunState::Draft,
            RunState::Building,
            self.config.targets.len()
        );

        let results = self.fan_out(version).await;

        // Fan-in barrier: every target has reached a terminal state before
        // the pool is assembled or read.
        let mut pool = ArtifactPool::default();
        let mut failures: Vec<(String, String)> = Vec::new();
        for (target, result) in results {
            match result {
                Ok(artifact) => {
                    pool.insert(artifact);
                }
                Err(err) => {
                    log::error!("target {} failed: {err}", target.triple);
                    failures.push((target.triple, err.to_string()));
                }
            }
        }
        log::info!(
            "state {} -> {}: {} artifact(s) in pool, {} failed",
            RunState::Building,
            RunState::ArtifactsReady,
            pool.len(),
            failures.len()
        );

        let targets = self.upload_artifacts(&record, &pool, failures).await;

        log::info!("state {} -> {}", RunState::ArtifactsReady, RunState::Packaging);
        let manifests = self.package(&record, &pool, version).await;

        let report = RunReport {
            version: version.to_string(),
            started,
            finished: Utc::now(),
            targets,
            manifests,
        };
        // The run already finished; failing to persist the summary must not
        // turn a successful release into a fatal exit.
        if let Err(err) = self.write_report(&report).await {
            log::warn!("failed to write run report: {err}");
        }
        log::info!(
            "state {} -> {}: draft release ready",
            RunState::Packaging,
            RunState::Published
        );

        Ok((record, report))
    }

    /// Dispatches one independent build task per matrix cell and waits for
    /// all of them. Cells may finish in any order; a panic in one task is
    /// recorded as that cell's failure.
    async fn fan_out(&self, version: &str) -> Vec<(TargetSpec, std::result::Result<BuildArtifact, BuildError>)> {
        let mut tasks = JoinSet::new();

        for target in self.config.targets.clone() {
            let executor = BuildExecutor::new(
                Arc::clone(&self.toolchain),
                self.config.product.clone(),
                version.to_string(),
                self.target_root.clone(),
                self.out_dir.join(&target.triple),
            );
            tasks.spawn(async move {
                let result = executor.build(&target).await;
                (target, result)
            });
        }

        let mut results = Vec::with_capacity(self.config.targets.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(cell) => results.push(cell),
                Err(join_err) => {
                    // The target identity is lost when a task panics; report
                    // it under a placeholder triple so the run still completes.
                    log::error!("build task panicked: {join_err}");
                    results.push((
                        TargetSpec {
                            triple: "<unknown>".to_string(),
                            os: crate::config::OsClass::Linux,
                            cross: false,
                            strip: false,
                        },
                        Err(BuildError::Compile {
                            triple: "<unknown>".to_string(),
                            diagnostics: format!("build task panicked: {join_err}"),
                        }),
                    ));
                }
            }
        }
        results
    }

    /// Attaches every pooled archive to the release record. One asset's
    /// failed attach does not block the others.
    async fn upload_artifacts(
        &self,
        record: &ReleaseRecord,
        pool: &ArtifactPool,
        failures: Vec<(String, String)>,
    ) -> Vec<TargetOutcome> {
        let mut outcomes = Vec::new();

        for artifact in pool.artifacts() {
            let uploaded = match self
                .store
                .attach(record, &artifact.archive_path, &artifact.asset_name)
                .await
            {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("failed to upload {}: {err}", artifact.asset_name);
                    false
                }
            };
            outcomes.push(TargetOutcome {
                triple: artifact.target.triple.clone(),
                status: TargetStatus::Built {
                    asset_name: artifact.asset_name.clone(),
                    uploaded,
                },
            });
        }

        for (triple, reason) in failures {
            outcomes.push(TargetOutcome {
                triple,
                status: TargetStatus::Failed { reason },
            });
        }

        // Keep report order stable regardless of task completion order.
        let order: HashMap<&str, usize> = self
            .config
            .targets
            .iter()
            .enumerate()
            .map(|(i, t)| (t.triple.as_str(), i))
            .collect();
        outcomes.sort_by_key(|o| order.get(o.triple.as_str()).copied().unwrap_or(usize::MAX));
        outcomes
    }

    /// Builds and runs a manifest job for every ecosystem whose required
    /// artifacts are all in the pool; the rest are skipped, not failed.
    async fn package(
        &self,
        record: &ReleaseRecord,
        pool: &ArtifactPool,
        version: &str,
    ) -> Vec<ManifestOutcome> {
        let mut outcomes = Vec::new();

        for eco in &self.config.ecosystems {
            let name = eco.ecosystem.to_string();

            let mut sources = Vec::with_capacity(eco.sources.len());
            let mut missing = Vec::new();
            for triple in &eco.sources {
                // Validated at config load; a source triple always resolves.
                let Some(target) = self.config.find_target(triple) else {
                    missing.push(triple.clone());
                    continue;
                };
                match pool.get(&target.key()) {
                    Some(artifact) => sources.push(artifact.archive_path.clone()),
                    None => missing.push(triple.clone()),
                }
            }

            if !missing.is_empty() {
                log::warn!("skipping {name} manifest, missing artifact(s): {}", missing.join(", "));
                outcomes.push(ManifestOutcome {
                    name,
                    status: ManifestStatus::Skipped { missing },
                });
                continue;
            }

            let job = ManifestJob {
                ecosystem: Some(eco.ecosystem),
                template_path: eco.template.clone(),
                output_path: self.out_dir.join(&eco.output),
                algorithm: eco.algorithm,
                sources,
            };

            match manifest::generate(&job, version).await {
                Ok(path) => {
                    let asset_name = eco
                        .output
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| name.clone());
                    let uploaded = match self.store.attach(record, &path, &asset_name).await {
                        Ok(()) => true,
                        Err(err) => {
                            log::warn!("failed to upload {asset_name}: {err}");
                            false
                        }
                    };
                    outcomes.push(ManifestOutcome {
                        name,
                        status: ManifestStatus::Generated { path, uploaded },
                    });
                }
                Err(err) => {
                    log::error!("{name} manifest failed: {err}");
                    outcomes.push(ManifestOutcome {
                        name,
                        status: ManifestStatus::Failed {
                            reason: err.to_string(),
                        },
                    });
                }
            }
        }

        outcomes
    }

    async fn write_report(&self, report: &RunReport) -> Result<()> {
        let path = self.out_dir.join("report.json");
        tokio::fs::create_dir_all(&self.out_dir).await?;
        let json = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&path, json).await?;
        log::debug!("wrote run report to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::DigestAlgorithm;
    use crate::config::{EcosystemSpec, OsClass};
    use crate::manifest::Ecosystem;
    use std::collections::HashSet;
    use std::path::Path;

    /// Toolchain that fabricates binaries, with configurable failures.
    struct FakeToolchain {
        root: PathBuf,
        fail: HashSet<String>,
    }

    impl Toolchain for FakeToolchain {
        async fn compile(&self, target: &TargetSpec, product: &str) -> std::result::Result<PathBuf, BuildError> {
            if self.fail.contains(&target.triple) {
                return Err(BuildError::Compile {
                    triple: target.triple.clone(),
                    diagnostics: "simulated compiler failure".to_string(),
                });
            }
            let dir = self.root.join(&target.triple);
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(format!("{product}{}", target.os.binary_suffix()));
            std::fs::write(&path, format!("binary for {}", target.triple))?;
            Ok(path)
        }

        async fn strip(&self, _binary: &Path, _target: &TargetSpec) -> std::result::Result<(), BuildError> {
            Ok(())
        }
    }

    fn linux_target(triple: &str) -> TargetSpec {
        TargetSpec {
            triple: triple.to_string(),
            os: OsClass::Linux,
            cross: false,
            strip: false,
        }
    }

    fn test_config(dir: &Path) -> ReleaseConfig {
        let template = dir.join("manifest.tmpl");
        std::fs::write(&template, "Version: {version}, SHA256: {sha256}\n").unwrap();

        ReleaseConfig {
            product: "gauge".to_string(),
            targets: vec![
                linux_target("x86_64-unknown-linux-gnu"),
                linux_target("aarch64-unknown-linux-gnu"),
                TargetSpec {
                    triple: "x86_64-pc-windows-msvc".to_string(),
                    os: OsClass::Windows,
                    cross: false,
                    strip: false,
                },
            ],
            ecosystems: vec![
                EcosystemSpec {
                    ecosystem: Ecosystem::Debian,
                    template: template.clone(),
                    output: PathBuf::from("manifests/debian-install.sh"),
                    algorithm: DigestAlgorithm::Sha256,
                    sources: vec!["x86_64-unknown-linux-gnu".to_string()],
                },
                EcosystemSpec {
                    ecosystem: Ecosystem::AurBinary,
                    template,
                    output: PathBuf::from("manifests/PKGBUILD-bin"),
                    algorithm: DigestAlgorithm::Sha256,
                    sources: vec!["aarch64-unknown-linux-gnu".to_string()],
                },
            ],
        }
    }

    fn coordinator(
        dir: &Path,
        fail: &[&str],
    ) -> Coordinator<FsReleaseStore, FakeToolchain> {
        let toolchain = FakeToolchain {
            root: dir.join("fake-binaries"),
            fail: fail.iter().map(|s| s.to_string()).collect(),
        };
        Coordinator::new(
            FsReleaseStore::new(dir.join("releases")),
            Arc::new(toolchain),
            test_config(dir),
            dir.join("target"),
            dir.join("out"),
        )
    }

    #[tokio::test]
    async fn clean_run_builds_everything_and_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path(), &[]);

        let (record, report) = coordinator.run("1.2.3").await.unwrap();

        assert_eq!(report.exit_code(), crate::report::EXIT_SUCCESS);
        assert_eq!(report.targets.len(), 3);
        assert_eq!(report.manifests.len(), 2);

        // All archives and manifests were attached to the record.
        let meta = coordinator.store.read(&record).await.unwrap();
        assert_eq!(meta.assets.len(), 5);
        assert!(meta.assets.contains(&"gauge-1.2.3-x86_64-pc-windows-msvc.zip".to_string()));
        assert!(meta.assets.contains(&"debian-install.sh".to_string()));
    }

    #[tokio::test]
    async fn one_failed_target_does_not_block_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path(), &["aarch64-unknown-linux-gnu"]);

        let (_, report) = coordinator.run("1.2.3").await.unwrap();

        assert_eq!(report.exit_code(), crate::report::EXIT_PARTIAL);

        let aarch64 = report
            .targets
            .iter()
            .find(|t| t.triple == "aarch64-unknown-linux-gnu")
            .unwrap();
        assert!(matches!(aarch64.status, TargetStatus::Failed { .. }));

        // Other targets still reached the pool and uploaded.
        let built = report
            .targets
            .iter()
            .filter(|t| matches!(t.status, TargetStatus::Built { uploaded: true, .. }))
            .count();
        assert_eq!(built, 2);

        // The debian manifest does not depend on aarch64 and is generated;
        // the aur-binary manifest is skipped, never failed.
        let debian = report.manifests.iter().find(|m| m.name == "debian").unwrap();
        assert!(matches!(debian.status, ManifestStatus::Generated { uploaded: true, .. }));

        let aur = report.manifests.iter().find(|m| m.name == "aur-binary").unwrap();
        match &aur.status {
            ManifestStatus::Skipped { missing } => {
                assert_eq!(missing, &vec!["aarch64-unknown-linux-gnu".to_string()]);
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generated_manifest_contains_pool_digest() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path(), &[]);

        let (_, report) = coordinator.run("1.2.3").await.unwrap();

        let debian = report.manifests.iter().find(|m| m.name == "debian").unwrap();
        let ManifestStatus::Generated { path, .. } = &debian.status else {
            panic!("debian manifest not generated");
        };

        let archive = dir
            .path()
            .join("out/x86_64-unknown-linux-gnu/gauge-1.2.3-x86_64-unknown-linux-gnu.tar.gz");
        let expected = crate::checksum::digest(&archive, DigestAlgorithm::Sha256)
            .await
            .unwrap();

        let rendered = std::fs::read_to_string(path).unwrap();
        assert_eq!(rendered, format!("Version: 1.2.3, SHA256: {expected}\n"));
    }

    /// Store that refuses to attach one named asset.
    struct RejectingStore {
        inner: FsReleaseStore,
        reject: String,
    }

    impl ReleaseStore for RejectingStore {
        async fn create(&self, version: &str) -> std::result::Result<ReleaseRecord, StoreError> {
            self.inner.create(version).await
        }

        async fn attach(
            &self,
            record: &ReleaseRecord,
            asset: &Path,
            name: &str,
        ) -> std::result::Result<(), StoreError> {
            if name == self.reject {
                return Err(StoreError::Attach {
                    asset: name.to_string(),
                    reason: "simulated upload failure".to_string(),
                });
            }
            self.inner.attach(record, asset, name).await
        }

        async fn read(&self, record: &ReleaseRecord) -> std::result::Result<ReleaseMeta, StoreError> {
            self.inner.read(record).await
        }
    }

    #[tokio::test]
    async fn one_failed_upload_does_not_block_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = RejectingStore {
            inner: FsReleaseStore::new(dir.path().join("releases")),
            reject: "gauge-1.2.3-aarch64-unknown-linux-gnu.tar.gz".to_string(),
        };
        let coordinator = Coordinator::new(
            store,
            Arc::new(FakeToolchain {
                root: dir.path().join("fake-binaries"),
                fail: HashSet::new(),
            }),
            test_config(dir.path()),
            dir.path().join("target"),
            dir.path().join("out"),
        );

        let (record, report) = coordinator.run("1.2.3").await.unwrap();
        assert_eq!(report.exit_code(), crate::report::EXIT_PARTIAL);

        let aarch64 = report
            .targets
            .iter()
            .find(|t| t.triple == "aarch64-unknown-linux-gnu")
            .unwrap();
        assert!(matches!(
            aarch64.status,
            TargetStatus::Built { uploaded: false, .. }
        ));
        let uploaded = report
            .targets
            .iter()
            .filter(|t| matches!(t.status, TargetStatus::Built { uploaded: true, .. }))
            .count();
        assert_eq!(uploaded, 2);

        // The aarch64 artifact is in the pool, so its manifest still renders
        // and attaches; only the archive upload itself failed.
        for manifest in &report.manifests {
            assert!(
                matches!(manifest.status, ManifestStatus::Generated { uploaded: true, .. }),
                "{} not generated and uploaded",
                manifest.name
            );
        }
        let meta = coordinator.store.read(&record).await.unwrap();
        assert_eq!(meta.assets.len(), 4);
    }

    #[tokio::test]
    async fn report_write_failure_does_not_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        // Occupy the report path so persisting the summary fails while the
        // release itself succeeds.
        std::fs::create_dir_all(dir.path().join("out/report.json")).unwrap();
        let coordinator = coordinator(dir.path(), &[]);

        let (_, report) = coordinator.run("1.2.3").await.unwrap();
        assert_eq!(report.exit_code(), crate::report::EXIT_SUCCESS);
        assert_eq!(report.targets.len(), 3);
    }

    #[tokio::test]
    async fn duplicate_release_creation_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path(), &[]);

        coordinator.run("1.2.3").await.unwrap();
        assert!(coordinator.run("1.2.3").await.is_err());
    }

    #[test]
    fn pool_refuses_duplicate_keys() {
        let artifact = BuildArtifact {
            target: linux_target("x86_64-unknown-linux-gnu"),
            binary_path: PathBuf::from("gauge"),
            aux_files: vec![],
            asset_name: "gauge.tar.gz".to_string(),
            archive_path: PathBuf::from("gauge.tar.gz"),
        };
        let mut pool = ArtifactPool::default();
        assert!(pool.insert(artifact.clone()));
        assert!(!pool.insert(artifact));
        assert_eq!(pool.len(), 1);
    }
}
