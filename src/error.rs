//! Crate-wide error types.
//!
//! Module-level error enums live next to the code that raises them; this
//! wrapper exists so the CLI and coordinator can propagate any of them
//! with `?`. Per-target and per-manifest failures never reach this type:
//! they are isolated into the run report instead.

use thiserror::Error;

/// Result type alias for release pipeline operations.
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Top-level error for the release pipeline.
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid version: {0}")]
    Version(#[from] semver::Error),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("checksum error: {0}")]
    Checksum(#[from] crate::checksum::ChecksumError),

    #[error("manifest error: {0}")]
    Manifest(#[from] crate::manifest::ManifestError),

    #[error("release store error: {0}")]
    Store(#[from] crate::release::StoreError),

    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}
