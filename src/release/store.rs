//! Release record store.
//!
//! The store is an external collaborator holding the versioned release
//! record and its uploaded assets. Writes are create-once and append-only:
//! no caller ever overwrites another's asset. The filesystem store backs
//! dry runs and tests; the GitHub store is in [`super::github`].

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from release store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Release record creation failed; fatal to the whole run.
    #[error("failed to create release record: {0}")]
    Create(String),

    /// Attaching one asset failed; never blocks other attaches.
    #[error("failed to attach asset '{asset}': {reason}")]
    Attach { asset: String, reason: String },

    #[error("failed to read release record: {0}")]
    Read(String),
}

/// The versioned release record, created once per run.
///
/// Threaded explicitly through the pipeline; the version and upload
/// destination are never ambient state. Only asset attachment mutates the
/// record after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRecord {
    /// Release version (semantic, dot-separated non-negative integers).
    pub version: String,

    /// Store-assigned record identity.
    pub record_id: String,

    /// Opaque upload destination for assets.
    pub upload_url: String,

    /// Records start as drafts; publishing flips this externally.
    pub draft: bool,
}

/// Release metadata as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseMeta {
    pub version: String,
    pub draft: bool,
    pub assets: Vec<String>,
}

/// Create/attach/read surface of the release record store.
pub trait ReleaseStore: Send + Sync {
    /// Creates a draft release record for `version`.
    fn create(&self, version: &str) -> impl Future<Output = Result<ReleaseRecord, StoreError>> + Send;

    /// Uploads the file at `asset` to the record under `name`.
    fn attach(
        &self,
        record: &ReleaseRecord,
        asset: &Path,
        name: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Reads back the record's metadata.
    fn read(&self, record: &ReleaseRecord) -> impl Future<Output = Result<ReleaseMeta, StoreError>> + Send;
}

/// Filesystem-backed store: one directory per release under a root.
pub struct FsReleaseStore {
    root: PathBuf,
}

impl FsReleaseStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn release_dir(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }

    fn meta_path(&self, version: &str) -> PathBuf {
        self.release_dir(version).join("meta.json")
    }

    // The meta helpers report bare reasons; callers wrap them in the
    // StoreError variant matching the operation that failed.
    async fn read_meta(&self, version: &str) -> Result<ReleaseMeta, String> {
        let text = tokio::fs::read_to_string(self.meta_path(version))
            .await
            .map_err(|e| e.to_string())?;
        serde_json::from_str(&text).map_err(|e| e.to_string())
    }

    async fn write_meta(&self, meta: &ReleaseMeta) -> Result<(), String> {
        let text = serde_json::to_string_pretty(meta).map_err(|e| e.to_string())?;
        tokio::fs::write(self.meta_path(&meta.version), text)
            .await
            .map_err(|e| e.to_string())
    }
}

impl ReleaseStore for FsReleaseStore {
    async fn create(&self, version: &str) -> Result<ReleaseRecord, StoreError> {
        let dir = self.release_dir(version);
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(StoreError::Create(format!(
                "release {version} already exists at {}",
                dir.display()
            )));
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::Create(e.to_string()))?;

        let meta = ReleaseMeta {
            version: version.to_string(),
            draft: true,
            assets: Vec::new(),
        };
        self.write_meta(&meta).await.map_err(StoreError::Create)?;

        Ok(ReleaseRecord {
            version: version.to_string(),
            record_id: version.to_string(),
            upload_url: dir.display().to_string(),
            draft: true,
        })
    }

    async fn attach(
        &self,
        record: &ReleaseRecord,
        asset: &Path,
        name: &str,
    ) -> Result<(), StoreError> {
        let dest = self.release_dir(&record.version).join(name);
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            return Err(StoreError::Attach {
                asset: name.to_string(),
                reason: "asset already attached".to_string(),
            });
        }

        tokio::fs::copy(asset, &dest)
            .await
            .map_err(|e| StoreError::Attach {
                asset: name.to_string(),
                reason: e.to_string(),
            })?;

        let attach_err = |reason| StoreError::Attach {
            asset: name.to_string(),
            reason,
        };
        let mut meta = self.read_meta(&record.version).await.map_err(attach_err)?;
        meta.assets.push(name.to_string());
        self.write_meta(&meta).await.map_err(attach_err)
    }

    async fn read(&self, record: &ReleaseRecord) -> Result<ReleaseMeta, StoreError> {
        self.read_meta(&record.version).await.map_err(StoreError::Read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_is_once_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsReleaseStore::new(dir.path());
        let record = store.create("1.2.3").await.unwrap();
        assert!(record.draft);
        assert!(matches!(
            store.create("1.2.3").await.unwrap_err(),
            StoreError::Create(_)
        ));
    }

    #[tokio::test]
    async fn attach_appends_and_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsReleaseStore::new(dir.path().join("releases"));
        let record = store.create("1.2.3").await.unwrap();

        let asset = dir.path().join("gauge.tar.gz");
        std::fs::write(&asset, "archive").unwrap();

        store.attach(&record, &asset, "gauge.tar.gz").await.unwrap();
        let err = store.attach(&record, &asset, "gauge.tar.gz").await.unwrap_err();
        assert!(matches!(err, StoreError::Attach { .. }));

        let meta = store.read(&record).await.unwrap();
        assert_eq!(meta.assets, vec!["gauge.tar.gz"]);
    }

    #[tokio::test]
    async fn attach_meta_failures_surface_as_attach_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsReleaseStore::new(dir.path());
        let record = store.create("1.2.3").await.unwrap();

        // Break the record's metadata so the attach-side bookkeeping fails.
        let meta_path = dir.path().join("1.2.3/meta.json");
        std::fs::remove_file(&meta_path).unwrap();
        std::fs::create_dir(&meta_path).unwrap();

        let asset = dir.path().join("gauge.tar.gz");
        std::fs::write(&asset, "archive").unwrap();

        let err = store.attach(&record, &asset, "gauge.tar.gz").await.unwrap_err();
        assert!(matches!(err, StoreError::Attach { .. }), "got {err}");
    }
}
