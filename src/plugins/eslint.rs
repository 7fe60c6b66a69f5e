//! Wrapper around ESLint for JavaScript/TypeScript files.
//!
//! ESLint is optional: when the tool is absent the plugin reports an empty
//! result rather than failing. Each collected file gets its own invocation,
//! fanned out on the engine's worker pool.

use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};

use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::collect;
use crate::error::PluginError;
use crate::plugins::{PluginPayload, ScanPlugin, ToolIssue};
use crate::report::Severity;
use crate::source::fetch::MaterializedSource;

const JS_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx"];

#[derive(Debug, Clone)]
pub struct EslintPlugin {
    program: String,
}

impl Default for EslintPlugin {
    fn default() -> Self {
        Self {
            program: "eslint".to_string(),
        }
    }
}

impl EslintPlugin {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn is_installed(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// One ESLint run over one file. Every failure mode here degrades to an
    /// empty list so the other files keep scanning.
    fn scan_file(&self, path: &Path) -> Vec<ToolIssue> {
        let output = match Command::new(&self.program)
            .args(["--no-ignore", "--format", "json"])
            .arg(path)
            .output()
        {
            Ok(output) => output,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to spawn eslint");
                return Vec::new();
            }
        };

        // 0 = clean, 1 = problems found; anything else is a tool error.
        match output.status.code() {
            Some(0) | Some(1) => {}
            code => {
                warn!(path = %path.display(), ?code, "eslint exited with unexpected code");
                return Vec::new();
            }
        }

        let results: Vec<EslintFileResult> = match serde_json::from_slice(&output.stdout) {
            Ok(results) => results,
            Err(err) => {
                warn!(path = %path.display(), %err, "could not parse eslint JSON output");
                return Vec::new();
            }
        };

        results
            .into_iter()
            .flat_map(|r| r.messages)
            .map(|m| ToolIssue {
                path: Some(path.to_path_buf()),
                line: m.line,
                column: m.column,
                rule: m.rule_id.unwrap_or_else(|| "eslint".to_string()),
                message: m.message,
                severity: if m.severity == 2 {
                    Severity::Error
                } else {
                    Severity::Warning
                },
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct EslintFileResult {
    #[serde(default)]
    messages: Vec<EslintMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintMessage {
    #[serde(default)]
    rule_id: Option<String>,
    severity: u8,
    message: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
}

impl ScanPlugin for EslintPlugin {
    fn name(&self) -> &'static str {
        "eslint"
    }

    fn scan(&self, source: &MaterializedSource) -> Result<PluginPayload, PluginError> {
        if !self.is_installed() {
            info!("eslint not installed, skipping");
            return Ok(PluginPayload::ToolIssues(Vec::new()));
        }

        let files = collect::collect(source, JS_EXTENSIONS);
        debug!(count = files.len(), "running eslint per file");

        let issues: Vec<ToolIssue> = files
            .par_iter()
            .flat_map_iter(|path| self.scan_file(path))
            .collect();

        Ok(PluginPayload::ToolIssues(issues))
    }
}
