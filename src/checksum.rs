//! Artifact checksum calculation.
//!
//! Computes SHA-256 or SHA-512 digests over artifact files. Downstream
//! packaging ecosystems (winget, Chocolatey, AUR, Homebrew) verify these
//! hashes against the published archives, so output must match the
//! reference algorithm bit-for-bit.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;
use tokio::io::AsyncReadExt;

/// Errors from checksum computation.
#[derive(Error, Debug)]
pub enum ChecksumError {
    /// File could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed to read
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Algorithm name not recognized.
    #[error("unsupported digest algorithm '{0}' (supported: sha256, sha512)")]
    UnsupportedAlgorithm(String),
}

/// Digest algorithm used when hashing release artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Placeholder base name used in manifest templates (`sha256`, `sha512`).
    pub fn placeholder_name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.placeholder_name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            other => Err(ChecksumError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Computes the digest of the file at `path` using `algorithm`.
///
/// Reads the file in 8KB chunks to handle large archives efficiently.
///
/// # Returns
///
/// Lowercase hex-encoded digest string (64 characters for SHA-256,
/// 128 for SHA-512).
pub async fn digest(path: &Path, algorithm: DigestAlgorithm) -> Result<String, ChecksumError> {
    match algorithm {
        DigestAlgorithm::Sha256 => hash_file::<Sha256>(path).await,
        DigestAlgorithm::Sha512 => hash_file::<Sha512>(path).await,
    }
}

async fn hash_file<D: Digest>(path: &Path) -> Result<String, ChecksumError> {
    let io_err = |source| ChecksumError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await.map_err(|source| ChecksumError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn digest_of(content: &[u8], algorithm: DigestAlgorithm) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input");
        std::fs::write(&path, content).unwrap();
        digest(&path, algorithm).await.unwrap()
    }

    #[tokio::test]
    async fn sha256_matches_reference_vectors() {
        assert_eq!(
            digest_of(b"", DigestAlgorithm::Sha256).await,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            digest_of(b"abc", DigestAlgorithm::Sha256).await,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn sha512_matches_reference_vectors() {
        assert_eq!(
            digest_of(b"", DigestAlgorithm::Sha512).await,
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
             47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
        );
        assert_eq!(
            digest_of(b"abc", DigestAlgorithm::Sha512).await,
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[tokio::test]
    async fn unreadable_file_is_an_io_error() {
        let err = digest(Path::new("/nonexistent/artifact.tar.gz"), DigestAlgorithm::Sha256)
            .await
            .unwrap_err();
        assert!(matches!(err, ChecksumError::Io { .. }));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let err = "md5".parse::<DigestAlgorithm>().unwrap_err();
        assert!(err.to_string().contains("md5"));
        assert!("sha256".parse::<DigestAlgorithm>().is_ok());
        assert!("SHA512".parse::<DigestAlgorithm>().is_ok());
    }
}
