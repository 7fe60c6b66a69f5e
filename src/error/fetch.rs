use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("git clone of '{url}' failed with exit code {code:?}")]
    CloneFailed { url: String, code: Option<i32> },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("required tool '{tool}' is not installed")]
    ToolMissing { tool: String },

    #[error("HTTP request to '{url}' failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP request to '{url}' returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("no usable artifact found for package '{package}'")]
    NoArtifact { package: String },

    #[error("all fetch strategies failed for package '{package}'")]
    StrategiesExhausted { package: String },

    #[error("download of '{package}' failed: {detail}")]
    Download { package: String, detail: String },

    #[error("failed to extract archive '{path}': {detail}")]
    Archive { path: PathBuf, detail: String },

    #[error("extracted package '{package}' is missing the expected 'package' directory")]
    PackageDirMissing { package: String },

    #[error("path does not exist: {path}")]
    NotFound { path: PathBuf },

    #[error("i/o failure at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn tool_missing(tool: impl Into<String>) -> Self {
        Self::ToolMissing { tool: tool.into() }
    }

    pub fn archive(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Archive {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_missing_display() {
        let err = FetchError::tool_missing("npm");
        assert_eq!(err.to_string(), "required tool 'npm' is not installed");
    }

    #[test]
    fn test_not_found_display() {
        let err = FetchError::NotFound {
            path: PathBuf::from("/no/such/dir"),
        };
        assert_eq!(err.to_string(), "path does not exist: /no/such/dir");
    }
}
