//! Gzipped tarball of the release artifacts.

use crate::error::{CliError, ReleaseError, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};

/// A created archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    /// Archive location
    pub path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
    /// Hex SHA-256 of the archive
    pub sha256: String,
}

/// Pack the contents of `source_dir` (not the directory itself) into a
/// `.tar.gz` at `dest`.
pub async fn create_archive(source_dir: &Path, dest: &Path) -> Result<ArchiveInfo> {
    let source_dir = source_dir.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || build_archive(&source_dir, &dest))
        .await
        .map_err(|e| {
            ReleaseError::Cli(CliError::ExecutionFailed {
                command: "create_archive".to_string(),
                reason: format!("Archive task failed: {e}"),
            })
        })?
}

fn build_archive(source_dir: &Path, dest: &Path) -> Result<ArchiveInfo> {
    if !source_dir.is_dir() {
        return Err(ReleaseError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Nothing to archive: {} is not a directory", source_dir.display()),
        )));
    }

    let file = File::create(dest)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(".", source_dir)?;
    builder.into_inner()?.finish()?.into_inner().map_err(|e| e.into_error())?;

    let (size_bytes, sha256) = digest_file(dest)?;
    log::info!(
        "Created {} ({} bytes, sha256 {})",
        dest.display(),
        size_bytes,
        sha256
    );

    Ok(ArchiveInfo {
        path: dest.to_path_buf(),
        size_bytes,
        sha256,
    })
}

fn digest_file(path: &Path) -> std::io::Result<(u64, String)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    Ok((total, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    #[tokio::test]
    async fn test_archive_contains_directory_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let linux = tmp.path().join("linux");
        std::fs::create_dir_all(&linux).unwrap();
        std::fs::write(linux.join("openwrt.bin"), b"image").unwrap();

        let dest = tmp.path().join("abc.tar.gz");
        let info = create_archive(&linux, &dest).await.unwrap();
        assert_eq!(info.sha256.len(), 64);
        assert_eq!(info.size_bytes, std::fs::metadata(&dest).unwrap().len());

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n.ends_with("openwrt.bin")));
    }

    #[tokio::test]
    async fn test_missing_source_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let result = create_archive(&tmp.path().join("missing"), &tmp.path().join("x.tar.gz")).await;
        assert!(result.is_err());
    }
}
