use std::process::{Command, Stdio};

use tracing::{debug, info};
use url::Url;

use crate::error::FetchError;
use crate::source::fetch::{scan_temp_dir, MaterializedSource, SourceKind};

/// Shallow-clones a repository into fresh temporary storage.
///
/// The clone program is a field so the exit-code contract can be exercised
/// without network access.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: String,
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl GitFetcher {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Depth-1 clone into a fresh temp dir. Any non-zero exit is fatal; the
    /// partially written clone directory is gone before the error returns.
    pub fn fetch(&self, url: &str) -> Result<MaterializedSource, FetchError> {
        let clone_url = normalize_repo_url(url);
        let temp = scan_temp_dir()?;
        info!(url = %clone_url, dest = %temp.path().display(), "cloning repository");

        let status = Command::new(&self.program)
            .args(["clone", "--depth", "1", &clone_url])
            .arg(temp.path())
            .stdout(Stdio::null())
            .status()
            .map_err(|e| FetchError::spawn(&self.program, e))?;

        if !status.success() {
            // `temp` drops here, removing the partial clone.
            return Err(FetchError::CloneFailed {
                url: clone_url,
                code: status.code(),
            });
        }

        debug!("clone completed");
        let root = temp.path().to_path_buf();
        Ok(MaterializedSource::ephemeral(
            root,
            SourceKind::Directory,
            temp,
        ))
    }
}

/// Expands the `github:owner/name` short form to a canonical clone URL;
/// full URLs pass through untouched.
pub fn normalize_repo_url(input: &str) -> String {
    match input.strip_prefix("github:") {
        Some(rest) => format!("https://github.com/{rest}.git"),
        None => input.to_string(),
    }
}

/// Rewrites a browse URL (`.../blob/<ref>/<path>`) into its raw-content
/// equivalent, dropping the `blob` marker.
pub fn raw_content_url(url: &str, branch: &str, path: &str) -> Result<String, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::Download {
        package: url.to_string(),
        detail: "not a valid URL".to_string(),
    })?;
    let mut segments = parsed
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()))
        .ok_or_else(|| FetchError::Download {
            package: url.to_string(),
            detail: "URL has no path".to_string(),
        })?;

    let (owner, repo) = match (segments.next(), segments.next()) {
        (Some(owner), Some(repo)) => (owner, repo),
        _ => {
            return Err(FetchError::Download {
                package: url.to_string(),
                detail: "URL is missing owner/repo segments".to_string(),
            })
        }
    };

    Ok(format!(
        "https://raw.githubusercontent.com/{owner}/{repo}/{branch}/{path}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_short_form() {
        assert_eq!(
            normalize_repo_url("github:acme/widgets"),
            "https://github.com/acme/widgets.git"
        );
    }

    #[test]
    fn test_normalize_full_url_passthrough() {
        assert_eq!(
            normalize_repo_url("https://github.com/acme/widgets"),
            "https://github.com/acme/widgets"
        );
    }

    #[test]
    fn test_raw_content_url_replaces_blob_marker() {
        let raw = raw_content_url(
            "https://github.com/acme/widgets/blob/main/src/app.py",
            "main",
            "src/app.py",
        )
        .unwrap();
        assert_eq!(
            raw,
            "https://raw.githubusercontent.com/acme/widgets/main/src/app.py"
        );
    }

    #[test]
    fn test_failed_clone_leaves_no_temp_dir_behind() {
        let count_scan_dirs = || {
            std::fs::read_dir(std::env::temp_dir())
                .unwrap()
                .filter_map(|e| e.ok())
                .filter(|e| {
                    e.file_name()
                        .to_string_lossy()
                        .starts_with(super::super::TEMP_DIR_PREFIX)
                })
                .count()
        };

        let before = count_scan_dirs();
        // `false` accepts any arguments and always exits 1.
        let fetcher = GitFetcher::with_program("false");
        let err = fetcher.fetch("https://github.com/acme/widgets").unwrap_err();
        assert!(matches!(err, FetchError::CloneFailed { code: Some(1), .. }));
        assert_eq!(count_scan_dirs(), before);
    }

    #[test]
    fn test_missing_clone_tool_is_spawn_error() {
        let fetcher = GitFetcher::with_program("reposcan-no-such-tool");
        let err = fetcher.fetch("github:acme/widgets").unwrap_err();
        assert!(matches!(err, FetchError::Spawn { .. }));
    }
}
