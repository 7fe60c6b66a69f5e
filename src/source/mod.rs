//! Classification of a user-supplied source reference into a typed address.
//!
//! An input string is matched against a fixed priority order: a repo
//! browse-file URL beats a plain repo URL, a registry prefix beats a generic
//! http(s) URL, and anything left over must name an existing local path.

pub mod fetch;

use std::path::PathBuf;

use url::Url;

use crate::error::ResolveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ecosystem {
    PyPi,
    Npm,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::PyPi => "pypi",
            Ecosystem::Npm => "npm",
        }
    }
}

/// Typed representation of the input string. Exactly one variant per input;
/// consumed immediately by the matching fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceAddress {
    GitRepo {
        url: String,
    },
    /// A single file inside a repo, addressed through a browse-style URL
    /// (`.../blob/<ref>/<path>`).
    GitFile {
        url: String,
        branch: String,
        path: String,
    },
    Registry {
        ecosystem: Ecosystem,
        name: String,
    },
    RemoteFile {
        url: String,
    },
    LocalPath {
        path: PathBuf,
    },
}

impl SourceAddress {
    /// Human-readable identifier used in the report header and to derive
    /// the report file name.
    pub fn describe(&self) -> String {
        match self {
            SourceAddress::GitRepo { url } => url.clone(),
            SourceAddress::GitFile { url, .. } => url.clone(),
            SourceAddress::Registry { ecosystem, name } => {
                format!("{}:{}", ecosystem.as_str(), name)
            }
            SourceAddress::RemoteFile { url } => url.clone(),
            SourceAddress::LocalPath { path } => path.display().to_string(),
        }
    }
}

/// Classify `input` into a [`SourceAddress`]. Pure and total: every string
/// either maps to a variant or fails with [`ResolveError`] before any
/// storage is touched.
pub fn resolve(input: &str) -> Result<SourceAddress, ResolveError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ResolveError::unrecognized(input));
    }

    if let Some(address) = match_git_file(input)? {
        return Ok(address);
    }
    if let Some(address) = match_git_repo(input) {
        return Ok(address);
    }
    if let Some(address) = match_registry(input)? {
        return Ok(address);
    }
    if input.starts_with("http://") || input.starts_with("https://") {
        return Ok(SourceAddress::RemoteFile {
            url: input.to_string(),
        });
    }

    let path = PathBuf::from(input);
    if path.exists() {
        return Ok(SourceAddress::LocalPath { path });
    }

    Err(ResolveError::unrecognized(input))
}

/// Matches `https://github.com/<owner>/<repo>/blob/<ref>/<path...>`.
fn match_git_file(input: &str) -> Result<Option<SourceAddress>, ResolveError> {
    if !is_github_url(input) || !input.contains("/blob/") {
        return Ok(None);
    }

    let url = Url::parse(input).map_err(|_| ResolveError::malformed("github", input))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    // owner / repo / "blob" / ref / path...
    if segments.len() < 5 || segments[2] != "blob" {
        return Err(ResolveError::malformed("github", input));
    }

    Ok(Some(SourceAddress::GitFile {
        url: input.to_string(),
        branch: segments[3].to_string(),
        path: segments[4..].join("/"),
    }))
}

fn match_git_repo(input: &str) -> Option<SourceAddress> {
    if let Some(rest) = input.strip_prefix("github:") {
        let mut parts = rest.splitn(2, '/');
        let owner = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        return Some(SourceAddress::GitRepo {
            url: input.to_string(),
        });
    }

    if is_github_url(input) {
        let url = Url::parse(input).ok()?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        // Exactly owner/repo: deeper paths are not a cloneable repo root.
        if segments.len() == 2 {
            return Some(SourceAddress::GitRepo {
                url: input.to_string(),
            });
        }
    }

    None
}

fn match_registry(input: &str) -> Result<Option<SourceAddress>, ResolveError> {
    let (ecosystem, name) = if let Some(name) = input
        .strip_prefix("pypi:")
        .or_else(|| input.strip_prefix("pip:"))
    {
        (Ecosystem::PyPi, name)
    } else if let Some(name) = input.strip_prefix("npm:") {
        (Ecosystem::Npm, name)
    } else {
        return Ok(None);
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(ResolveError::malformed("registry", input));
    }

    Ok(Some(SourceAddress::Registry {
        ecosystem,
        name: name.to_string(),
    }))
}

fn is_github_url(input: &str) -> bool {
    input.starts_with("https://github.com/") || input.starts_with("http://github.com/")
}
