//! Wrapper around the `bandit` security linter for Python.
//!
//! Invocation contract: recursive run with JSON output; exit 0 means no
//! issues and exit 1 means issues found (both success), anything else is a
//! plugin failure.

use std::io::ErrorKind;
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::PluginError;
use crate::plugins::{PluginPayload, ScanPlugin, ToolIssue};
use crate::report::Severity;
use crate::source::fetch::MaterializedSource;

#[derive(Debug, Clone)]
pub struct BanditPlugin {
    program: String,
}

impl Default for BanditPlugin {
    fn default() -> Self {
        Self {
            program: "bandit".to_string(),
        }
    }
}

impl BanditPlugin {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BanditOutput {
    #[serde(default)]
    results: Vec<BanditResult>,
}

#[derive(Debug, Deserialize)]
struct BanditResult {
    filename: String,
    line_number: u32,
    #[serde(default)]
    col_offset: Option<u32>,
    test_id: String,
    issue_text: String,
    issue_severity: String,
}

impl ScanPlugin for BanditPlugin {
    fn name(&self) -> &'static str {
        "bandit"
    }

    fn scan(&self, source: &MaterializedSource) -> Result<PluginPayload, PluginError> {
        let output = Command::new(&self.program)
            .arg("-r")
            .arg(source.root())
            .args(["-f", "json"])
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => PluginError::tool_missing(&self.program),
                _ => PluginError::spawn(&self.program, e),
            })?;

        match output.status.code() {
            Some(0) | Some(1) => {}
            code => return Err(PluginError::unexpected_exit(&self.program, code)),
        }

        let parsed: BanditOutput = match serde_json::from_slice(&output.stdout) {
            Ok(parsed) => parsed,
            Err(err) => {
                // Malformed output counts as no findings for this run.
                warn!(%err, "could not parse bandit JSON output");
                return Ok(PluginPayload::ToolIssues(Vec::new()));
            }
        };
        debug!(count = parsed.results.len(), "bandit reported issues");

        let issues = parsed
            .results
            .into_iter()
            .map(|result| ToolIssue {
                path: Some(result.filename.into()),
                line: Some(result.line_number),
                column: result.col_offset,
                rule: result.test_id,
                message: result.issue_text,
                severity: translate_severity(&result.issue_severity),
            })
            .collect();

        Ok(PluginPayload::ToolIssues(issues))
    }
}

fn translate_severity(word: &str) -> Severity {
    match word.to_uppercase().as_str() {
        "HIGH" => Severity::Error,
        "MEDIUM" => Severity::Warning,
        "LOW" => Severity::Info,
        _ => Severity::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fetch::SourceKind;
    use tempfile::TempDir;

    #[test]
    fn test_translate_severity_scale() {
        assert_eq!(translate_severity("HIGH"), Severity::Error);
        assert_eq!(translate_severity("medium"), Severity::Warning);
        assert_eq!(translate_severity("LOW"), Severity::Info);
        assert_eq!(translate_severity("whatever"), Severity::Unknown);
    }

    #[test]
    fn test_missing_tool_is_reported_as_such() {
        let dir = TempDir::new().unwrap();
        let source =
            MaterializedSource::persistent(dir.path().to_path_buf(), SourceKind::Directory);
        let plugin = BanditPlugin::with_program("reposcan-no-such-tool");
        let err = plugin.scan(&source).unwrap_err();
        assert!(matches!(err, PluginError::ToolMissing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_unexpected_exit_code_is_a_plugin_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        // Exit 2 is outside the 0/1 success convention.
        let stub = dir.path().join("bandit-stub");
        std::fs::write(&stub, "#!/bin/sh\nexit 2\n").unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let source =
            MaterializedSource::persistent(dir.path().to_path_buf(), SourceKind::Directory);
        let plugin = BanditPlugin::with_program(stub.to_string_lossy());
        let err = plugin.scan(&source).unwrap_err();
        assert!(matches!(
            err,
            PluginError::UnexpectedExit { code: Some(2), .. }
        ));
    }

    #[test]
    fn test_parse_bandit_output_shape() {
        let raw = r#"{
            "results": [{
                "filename": "app.py",
                "line_number": 12,
                "col_offset": 4,
                "test_id": "B102",
                "issue_text": "exec_used",
                "issue_severity": "MEDIUM"
            }]
        }"#;
        let parsed: BanditOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].test_id, "B102");
        assert_eq!(translate_severity(&parsed.results[0].issue_severity), Severity::Warning);
    }
}
