//! Fetchers turn a [`SourceAddress`](crate::source::SourceAddress) into a
//! local filesystem view.
//!
//! Every fetcher that allocates temporary storage hands ownership of the
//! [`TempDir`] to the returned [`MaterializedSource`]; dropping the source is
//! the single reclamation point, on every exit path. A fetcher that fails
//! mid-flight drops its own `TempDir` before the error propagates, so no
//! partial storage outlives the attempt.

pub mod archive;
mod git;
mod registry;
mod remote;

pub use git::GitFetcher;
pub use registry::{NpmFetcher, PyPiFetcher};
pub use remote::RemoteFileFetcher;

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::FetchError;
use crate::source::{Ecosystem, SourceAddress};

pub const TEMP_DIR_PREFIX: &str = "repo-scan-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Directory,
}

/// The local filesystem result of fetching a source address.
///
/// Read-only for every consumer. When `temp` is populated the root lives in
/// ephemeral storage owned by this value; local-path sources carry `None`
/// and are never deleted.
#[derive(Debug)]
pub struct MaterializedSource {
    root: PathBuf,
    kind: SourceKind,
    temp: Option<TempDir>,
}

impl MaterializedSource {
    pub fn ephemeral(root: PathBuf, kind: SourceKind, temp: TempDir) -> Self {
        Self {
            root,
            kind,
            temp: Some(temp),
        }
    }

    pub fn persistent(root: PathBuf, kind: SourceKind) -> Self {
        Self {
            root,
            kind,
            temp: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn is_ephemeral(&self) -> bool {
        self.temp.is_some()
    }
}

/// Creates a fresh scan-scoped temporary directory.
pub(crate) fn scan_temp_dir() -> Result<TempDir, FetchError> {
    tempfile::Builder::new()
        .prefix(TEMP_DIR_PREFIX)
        .tempdir()
        .map_err(|e| FetchError::io(std::env::temp_dir(), e))
}

/// The set of fetchers, one per address variant. Tool program names are
/// fields so tests can substitute failing or absent commands.
#[derive(Debug, Default)]
pub struct Fetchers {
    pub git: GitFetcher,
    pub pypi: PyPiFetcher,
    pub npm: NpmFetcher,
    pub remote: RemoteFileFetcher,
}

impl Fetchers {
    pub fn fetch(&self, address: &SourceAddress) -> Result<MaterializedSource, FetchError> {
        match address {
            SourceAddress::GitRepo { url } => self.git.fetch(url),
            SourceAddress::GitFile { url, branch, path } => {
                let raw = git::raw_content_url(url, branch, path)?;
                debug!(url, raw, "rewrote browse URL to raw content URL");
                self.remote.fetch(&raw)
            }
            SourceAddress::Registry { ecosystem, name } => match ecosystem {
                Ecosystem::PyPi => self.pypi.fetch(name),
                Ecosystem::Npm => self.npm.fetch(name),
            },
            SourceAddress::RemoteFile { url } => self.remote.fetch(url),
            SourceAddress::LocalPath { path } => fetch_local(path),
        }
    }
}

fn fetch_local(path: &Path) -> Result<MaterializedSource, FetchError> {
    let kind = if path.is_file() {
        SourceKind::File
    } else if path.is_dir() {
        SourceKind::Directory
    } else {
        return Err(FetchError::NotFound {
            path: path.to_path_buf(),
        });
    };
    Ok(MaterializedSource::persistent(path.to_path_buf(), kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_is_never_ephemeral() {
        let dir = TempDir::new().unwrap();
        let source = fetch_local(dir.path()).unwrap();
        assert!(!source.is_ephemeral());
        assert_eq!(source.kind(), SourceKind::Directory);
        assert_eq!(source.root(), dir.path());
    }

    #[test]
    fn test_local_file_keeps_file_kind() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("one.py");
        std::fs::write(&file, "x = 1").unwrap();
        let source = fetch_local(&file).unwrap();
        assert_eq!(source.kind(), SourceKind::File);
    }

    #[test]
    fn test_missing_local_path_is_fatal() {
        let err = fetch_local(Path::new("/no/such/path/at/all")).unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[test]
    fn test_ephemeral_source_removes_dir_on_drop() {
        let temp = scan_temp_dir().unwrap();
        let root = temp.path().to_path_buf();
        let source = MaterializedSource::ephemeral(root.clone(), SourceKind::Directory, temp);
        assert!(source.is_ephemeral());
        assert!(root.exists());
        drop(source);
        assert!(!root.exists());
    }
}
