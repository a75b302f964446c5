//! Artifact archive creation.
//!
//! Bundles a binary and its auxiliary files into a single archive: zip for
//! Windows targets, tar+gzip otherwise. Archive writing is synchronous
//! library work, so it runs under `spawn_blocking`.

use std::path::{Path, PathBuf};

use super::BuildError;
use crate::config::ArchiveFormat;

/// Writes `entries` into an archive at `dest`.
///
/// Each entry is a `(source path, name in archive)` pair; entries are
/// written in the order given. Parent directories of `dest` are created.
pub async fn bundle(
    format: ArchiveFormat,
    dest: &Path,
    entries: Vec<(PathBuf, String)>,
) -> Result<(), BuildError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || match format {
        ArchiveFormat::TarGz => write_tar_gz(&dest, entries),
        ArchiveFormat::Zip => write_zip(&dest, entries),
    })
    .await
    .map_err(|e| BuildError::Bundle(format!("archive task panicked: {e}")))?
}

fn write_tar_gz(dest: &Path, entries: Vec<(PathBuf, String)>) -> Result<(), BuildError> {
    let bundle_err = |e: std::io::Error| BuildError::Bundle(format!("{}: {e}", dest.display()));

    let file = std::fs::File::create(dest).map_err(bundle_err)?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (source, name) in entries {
        builder
            .append_path_with_name(&source, &name)
            .map_err(|e| BuildError::Bundle(format!("adding {name}: {e}")))?;
    }

    let encoder = builder.into_inner().map_err(bundle_err)?;
    encoder.finish().map_err(bundle_err)?;
    Ok(())
}

fn write_zip(dest: &Path, entries: Vec<(PathBuf, String)>) -> Result<(), BuildError> {
    let file = std::fs::File::create(dest)
        .map_err(|e| BuildError::Bundle(format!("{}: {e}", dest.display())))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);

    for (source, name) in entries {
        writer
            .start_file(name.clone(), options)
            .map_err(|e| BuildError::Bundle(format!("adding {name}: {e}")))?;
        let mut input = std::fs::File::open(&source)
            .map_err(|e| BuildError::Bundle(format!("opening {}: {e}", source.display())))?;
        std::io::copy(&mut input, &mut writer)
            .map_err(|e| BuildError::Bundle(format!("writing {name}: {e}")))?;
    }

    writer
        .finish()
        .map_err(|e| BuildError::Bundle(format!("{}: {e}", dest.display())))?;
    Ok(())
}
