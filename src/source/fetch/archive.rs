//! Unpacks registry artifacts (tar.gz sdists, npm tarballs, zip/wheel
//! archives) into a directory, unwrapping the single nested top-level
//! directory most sdists ship with.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::FetchError;

/// Extract `artifact` into `dest` (created if absent) and return the
/// effective source root. Format is chosen by file name suffix.
pub fn extract_artifact(artifact: &Path, dest: &Path) -> Result<PathBuf, FetchError> {
    fs::create_dir_all(dest).map_err(|e| FetchError::io(dest, e))?;

    let name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar_gz(artifact, dest)?;
    } else if name.ends_with(".zip") || name.ends_with(".whl") {
        extract_zip(artifact, dest)?;
    } else {
        return Err(FetchError::archive(artifact, "unsupported archive format"));
    }

    Ok(unwrap_single_dir(dest))
}

pub fn extract_tar_gz(artifact: &Path, dest: &Path) -> Result<(), FetchError> {
    let file = File::open(artifact).map_err(|e| FetchError::io(artifact, e))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive
        .unpack(dest)
        .map_err(|e| FetchError::archive(artifact, e.to_string()))?;
    debug!(artifact = %artifact.display(), dest = %dest.display(), "unpacked tarball");
    Ok(())
}

pub fn extract_zip(artifact: &Path, dest: &Path) -> Result<(), FetchError> {
    let file = File::open(artifact).map_err(|e| FetchError::io(artifact, e))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| FetchError::archive(artifact, e.to_string()))?;
    archive
        .extract(dest)
        .map_err(|e| FetchError::archive(artifact, e.to_string()))?;
    debug!(artifact = %artifact.display(), dest = %dest.display(), "unpacked zip archive");
    Ok(())
}

/// Sdists typically contain one `<name>-<version>/` directory; treat that
/// directory as the root when it is the only entry.
fn unwrap_single_dir(dest: &Path) -> PathBuf {
    let entries: Vec<PathBuf> = match fs::read_dir(dest) {
        Ok(iter) => iter.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => return dest.to_path_buf(),
    };

    match entries.as_slice() {
        [single] if single.is_dir() => single.clone(),
        _ => dest.to_path_buf(),
    }
}
