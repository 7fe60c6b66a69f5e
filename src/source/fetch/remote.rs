use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::info;
use url::Url;

use crate::error::FetchError;
use crate::source::fetch::{scan_temp_dir, MaterializedSource, SourceKind};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads a single remote file over HTTP with a bounded timeout.
#[derive(Debug, Clone)]
pub struct RemoteFileFetcher {
    timeout: Duration,
}

impl Default for RemoteFileFetcher {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RemoteFileFetcher {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// GET the URL and write the body verbatim under the URL's basename in
    /// fresh temporary storage. Non-2xx and network errors are fatal.
    pub fn fetch(&self, url: &str) -> Result<MaterializedSource, FetchError> {
        let bytes = self.get_bytes(url)?;

        let temp = scan_temp_dir()?;
        let file_path = temp.path().join(url_basename(url));
        fs::write(&file_path, &bytes).map_err(|e| FetchError::io(&file_path, e))?;
        info!(url, dest = %file_path.display(), size = bytes.len(), "downloaded remote file");

        Ok(MaterializedSource::ephemeral(
            file_path,
            SourceKind::File,
            temp,
        ))
    }

    /// GET the URL into `dest`. Used by registry fetchers for artifacts.
    pub fn download_to(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let bytes = self.get_bytes(url)?;
        fs::write(dest, &bytes).map_err(|e| FetchError::io(dest, e))?;
        Ok(())
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| http_error(url, e))?;

        let response = client.get(url).send().map_err(|e| http_error(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().map_err(|e| http_error(url, e))?;
        Ok(body.to_vec())
    }
}

fn http_error(url: &str, source: reqwest::Error) -> FetchError {
    FetchError::Http {
        url: url.to_string(),
        source,
    }
}

/// Last non-empty path segment of the URL, or a fixed fallback when the URL
/// has no usable path.
fn url_basename(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|s| s.filter(|p| !p.is_empty()).next_back().map(String::from))
        })
        .unwrap_or_else(|| "download".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_basename() {
        assert_eq!(url_basename("https://example.com/a/b/payload.js"), "payload.js");
        assert_eq!(url_basename("https://example.com/script.py"), "script.py");
    }

    #[test]
    fn test_url_basename_fallback() {
        assert_eq!(url_basename("https://example.com/"), "download");
        assert_eq!(url_basename("https://example.com"), "download");
    }
}
