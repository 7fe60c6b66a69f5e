//! The plugin contract and the engine that runs plugins with failure
//! isolation.
//!
//! Plugins are independent analysis units over the same immutable
//! materialized root. A plugin that fails (tool missing, unexpected exit,
//! spawn error) contributes an empty payload and a warning; the run always
//! continues to the remaining plugins.

pub mod ast;
pub mod bandit;
pub mod deps;
pub mod eslint;
pub mod patterns;

use std::collections::BTreeMap;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PluginError;
use crate::report::Severity;
use crate::source::fetch::MaterializedSource;

/// Matches found in one file by a pattern-style plugin: category name to
/// the list of matched strings.
#[derive(Debug, Clone, Serialize)]
pub struct FileMatches {
    pub path: PathBuf,
    pub categories: BTreeMap<String, Vec<String>>,
}

/// One issue reported by an external tool or AST visitor, already mapped
/// onto the canonical severity scale.
#[derive(Debug, Clone, Serialize)]
pub struct ToolIssue {
    pub path: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub rule: String,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize)]
pub struct Advisory {
    pub id: String,
    pub description: String,
    /// Native tool severity word; translated by the aggregator.
    pub severity: String,
}

/// Vulnerabilities reported against one pinned package.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyIssue {
    pub package: String,
    pub version: String,
    pub advisories: Vec<Advisory>,
}

/// Per-plugin result payload. Each variant has exactly one reducer in the
/// aggregator; plugins never format report text themselves.
#[derive(Debug, Clone, Serialize)]
pub enum PluginPayload {
    Patterns(Vec<FileMatches>),
    ToolIssues(Vec<ToolIssue>),
    Dependency {
        manifest: Vec<(String, String)>,
        issues: Vec<DependencyIssue>,
    },
    /// Fallback for payload shapes the aggregator has no reducer for;
    /// rendered as a raw dump rather than dropped.
    Raw(serde_json::Value),
}

pub trait ScanPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn scan(&self, source: &MaterializedSource) -> Result<PluginPayload, PluginError>;

    /// The payload recorded when this plugin fails; shaped like a
    /// zero-finding success so the report section still renders.
    fn empty_payload(&self) -> PluginPayload {
        PluginPayload::ToolIssues(Vec::new())
    }
}

/// One plugin's outcome, in registration order.
#[derive(Debug)]
pub struct PluginRun {
    pub plugin: &'static str,
    pub payload: PluginPayload,
}

/// Run every registered plugin against the root on a bounded worker pool.
///
/// Output order is registration order regardless of completion order;
/// plugin failures are isolated into empty payloads.
pub fn run_all(
    plugins: &[Box<dyn ScanPlugin>],
    source: &MaterializedSource,
    jobs: usize,
) -> Vec<PluginRun> {
    let scan_one = |plugin: &Box<dyn ScanPlugin>| {
        info!(plugin = plugin.name(), "running plugin");
        match plugin.scan(source) {
            Ok(payload) => PluginRun {
                plugin: plugin.name(),
                payload,
            },
            Err(err) => {
                warn!(plugin = plugin.name(), %err, "plugin failed, recording empty result");
                PluginRun {
                    plugin: plugin.name(),
                    payload: plugin.empty_payload(),
                }
            }
        }
    };

    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(|| plugins.par_iter().map(scan_one).collect()),
        Err(err) => {
            warn!(%err, "worker pool unavailable, running plugins sequentially");
            plugins.iter().map(scan_one).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fetch::SourceKind;
    use tempfile::TempDir;

    struct OkPlugin;
    impl ScanPlugin for OkPlugin {
        fn name(&self) -> &'static str {
            "ok"
        }
        fn scan(&self, _source: &MaterializedSource) -> Result<PluginPayload, PluginError> {
            Ok(PluginPayload::ToolIssues(vec![ToolIssue {
                path: None,
                line: None,
                column: None,
                rule: "demo".to_string(),
                message: "found".to_string(),
                severity: Severity::Warning,
            }]))
        }
    }

    struct FailingPlugin;
    impl ScanPlugin for FailingPlugin {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn scan(&self, _source: &MaterializedSource) -> Result<PluginPayload, PluginError> {
            Err(PluginError::tool_missing("made-up-tool"))
        }
        fn empty_payload(&self) -> PluginPayload {
            PluginPayload::Patterns(Vec::new())
        }
    }

    #[test]
    fn test_failure_is_isolated_and_order_preserved() {
        let dir = TempDir::new().unwrap();
        let source =
            MaterializedSource::persistent(dir.path().to_path_buf(), SourceKind::Directory);
        let plugins: Vec<Box<dyn ScanPlugin>> =
            vec![Box::new(FailingPlugin), Box::new(OkPlugin)];

        let runs = run_all(&plugins, &source, 2);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].plugin, "failing");
        assert!(matches!(&runs[0].payload, PluginPayload::Patterns(v) if v.is_empty()));
        assert_eq!(runs[1].plugin, "ok");
        assert!(matches!(&runs[1].payload, PluginPayload::ToolIssues(v) if v.len() == 1));
    }
}
