use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::source::fetch::{
    archive, scan_temp_dir, MaterializedSource, RemoteFileFetcher, SourceKind,
};

/// Fetches a PyPI package as source, trying strategies in order:
/// registry metadata sdist, source-only `pip download`, then a plain
/// `pip download` accepting a wheel. First success wins.
#[derive(Debug, Clone)]
pub struct PyPiFetcher {
    pip: String,
    index_url: String,
    remote: RemoteFileFetcher,
}

impl Default for PyPiFetcher {
    fn default() -> Self {
        Self {
            pip: "pip".to_string(),
            index_url: "https://pypi.org/pypi".to_string(),
            remote: RemoteFileFetcher::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PackageMetadata {
    #[serde(default)]
    urls: Vec<ArtifactRecord>,
}

#[derive(Debug, Deserialize)]
struct ArtifactRecord {
    packagetype: String,
    url: String,
    filename: String,
}

impl PyPiFetcher {
    pub fn with_programs(pip: impl Into<String>, index_url: impl Into<String>) -> Self {
        Self {
            pip: pip.into(),
            index_url: index_url.into(),
            remote: RemoteFileFetcher::default(),
        }
    }

    pub fn fetch(&self, name: &str) -> Result<MaterializedSource, FetchError> {
        match self.fetch_sdist_from_index(name) {
            Ok(source) => return Ok(source),
            Err(err) => warn!(package = name, %err, "sdist lookup via registry index failed"),
        }
        match self.pip_download(name, true) {
            Ok(source) => return Ok(source),
            Err(err) => warn!(package = name, %err, "source-only pip download failed"),
        }
        match self.pip_download(name, false) {
            Ok(source) => return Ok(source),
            Err(err) => warn!(package = name, %err, "generic pip download failed"),
        }

        Err(FetchError::StrategiesExhausted {
            package: name.to_string(),
        })
    }

    /// Strategy 1: ask the registry's JSON metadata endpoint for a
    /// source-distribution artifact, download it, extract it.
    fn fetch_sdist_from_index(&self, name: &str) -> Result<MaterializedSource, FetchError> {
        let meta_url = format!("{}/{}/json", self.index_url, name);
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Http {
                url: meta_url.clone(),
                source: e,
            })?;

        let response = client
            .get(&meta_url)
            .send()
            .map_err(|e| FetchError::Http {
                url: meta_url.clone(),
                source: e,
            })?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                url: meta_url,
                status: response.status().as_u16(),
            });
        }
        let metadata: PackageMetadata = response.json().map_err(|e| FetchError::Http {
            url: meta_url.clone(),
            source: e,
        })?;

        let sdist = metadata
            .urls
            .iter()
            .find(|a| a.packagetype == "sdist")
            .ok_or_else(|| FetchError::NoArtifact {
                package: name.to_string(),
            })?;
        info!(package = name, artifact = %sdist.filename, "selected sdist from registry index");

        let temp = scan_temp_dir()?;
        let artifact_path = temp.path().join(&sdist.filename);
        self.remote.download_to(&sdist.url, &artifact_path)?;

        let root = archive::extract_artifact(&artifact_path, &temp.path().join("src"))?;
        Ok(MaterializedSource::ephemeral(
            root,
            SourceKind::Directory,
            temp,
        ))
    }

    /// Strategies 2 and 3: a dependency-less `pip download`, source-only
    /// when `source_only` is set, then extract whatever artifact landed.
    fn pip_download(&self, name: &str, source_only: bool) -> Result<MaterializedSource, FetchError> {
        let temp = scan_temp_dir()?;
        let download_dir = temp.path().join("dl");
        fs::create_dir_all(&download_dir).map_err(|e| FetchError::io(&download_dir, e))?;

        let mut command = Command::new(&self.pip);
        command.args(["download", "--no-deps"]);
        if source_only {
            command.args(["--no-binary", ":all:"]);
        }
        command.arg(name).arg("-d").arg(&download_dir);

        let output = command
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| FetchError::spawn(&self.pip, e))?;
        if !output.status.success() {
            return Err(FetchError::Download {
                package: name.to_string(),
                detail: format!("pip download exited with {:?}", output.status.code()),
            });
        }

        let artifact = first_file_in(&download_dir)?.ok_or_else(|| FetchError::NoArtifact {
            package: name.to_string(),
        })?;
        debug!(package = name, artifact = %artifact.display(), "pip download produced artifact");

        let root = archive::extract_artifact(&artifact, &temp.path().join("src"))?;
        Ok(MaterializedSource::ephemeral(
            root,
            SourceKind::Directory,
            temp,
        ))
    }
}

fn first_file_in(dir: &PathBuf) -> Result<Option<PathBuf>, FetchError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| FetchError::io(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files.into_iter().next())
}

/// Fetches an npm package by packing it into a tarball and extracting it.
/// The npm tool is required up front; probing happens before any temporary
/// storage exists, so a missing tool never leaves anything to clean up.
#[derive(Debug, Clone)]
pub struct NpmFetcher {
    program: String,
}

impl Default for NpmFetcher {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
        }
    }
}

impl NpmFetcher {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn fetch(&self, name: &str) -> Result<MaterializedSource, FetchError> {
        self.probe_tool()?;

        let temp = scan_temp_dir()?;
        info!(package = name, "packing npm package");
        let output = Command::new(&self.program)
            .args(["pack", name, "--pack-destination"])
            .arg(temp.path())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| FetchError::spawn(&self.program, e))?;
        if !output.status.success() {
            return Err(FetchError::Download {
                package: name.to_string(),
                detail: format!(
                    "npm pack exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let tarball = find_tarball(temp.path())?.ok_or_else(|| FetchError::NoArtifact {
            package: name.to_string(),
        })?;

        let extract_dir = temp.path().join("x");
        fs::create_dir_all(&extract_dir).map_err(|e| FetchError::io(&extract_dir, e))?;
        archive::extract_tar_gz(&tarball, &extract_dir)?;

        // npm tarballs place their content under `package/`.
        let package_dir = extract_dir.join("package");
        if !package_dir.is_dir() {
            return Err(FetchError::PackageDirMissing {
                package: name.to_string(),
            });
        }

        Ok(MaterializedSource::ephemeral(
            package_dir,
            SourceKind::Directory,
            temp,
        ))
    }

    fn probe_tool(&self) -> Result<(), FetchError> {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(FetchError::tool_missing(&self.program)),
        }
    }
}

fn find_tarball(dir: &std::path::Path) -> Result<Option<PathBuf>, FetchError> {
    let found = fs::read_dir(dir)
        .map_err(|e| FetchError::io(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| {
            p.is_file()
                && p.file_name()
                    .map(|n| n.to_string_lossy().ends_with(".tgz"))
                    .unwrap_or(false)
        });
    Ok(found)
}
