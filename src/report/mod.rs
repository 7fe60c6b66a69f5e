//! Canonical finding model and the per-payload-kind reducers that turn
//! plugin results into one report.

mod render;

pub use render::{render_markdown, sanitize_source_name, write_report};

use std::path::PathBuf;

use serde::Serialize;

use crate::plugins::{PluginPayload, PluginRun};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    #[default]
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Unknown => "unknown",
        }
    }

    /// Translate a tool's native severity word onto the canonical scale.
    pub fn from_tool_scale(word: &str) -> Self {
        match word.to_lowercase().as_str() {
            "critical" | "high" | "error" => Severity::Error,
            "medium" | "moderate" | "warning" => Severity::Warning,
            "low" | "info" => Severity::Info,
            _ => Severity::Unknown,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Locator {
    pub path: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// One canonical, severity-tagged unit of reported suspicion, regardless of
/// the originating plugin. `severity` is always populated.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub plugin: String,
    pub locator: Locator,
    pub category: String,
    pub message: String,
    pub severity: Severity,
    pub evidence: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Section {
    pub plugin: String,
    pub issue_count: usize,
    /// Extra header line for the dependency section (manifest summary).
    pub manifest_note: Option<String>,
    pub findings: Vec<Finding>,
    /// Populated only for payload kinds without a dedicated reducer.
    pub raw: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub source: String,
    pub sections: Vec<Section>,
}

impl Report {
    pub fn total_issues(&self) -> usize {
        self.sections.iter().map(|s| s.issue_count).sum()
    }
}

/// Reduce every plugin run into a [`Report`]. Section order equals the
/// order of `runs`, which the engine keeps in registration order.
pub fn aggregate(source: &str, runs: &[PluginRun]) -> Report {
    let sections = runs.iter().map(reduce_section).collect();
    Report {
        source: source.to_string(),
        sections,
    }
}

fn reduce_section(run: &PluginRun) -> Section {
    match &run.payload {
        PluginPayload::Patterns(files) => reduce_patterns(run.plugin, files),
        PluginPayload::ToolIssues(issues) => reduce_tool_issues(run.plugin, issues),
        PluginPayload::Dependency { manifest, issues } => {
            reduce_dependency(run.plugin, manifest, issues)
        }
        PluginPayload::Raw(value) => Section {
            plugin: run.plugin.to_string(),
            issue_count: 0,
            manifest_note: None,
            findings: Vec::new(),
            raw: Some(value.clone()),
        },
    }
}

/// One finding per (file, category), evidence carrying the match list.
fn reduce_patterns(plugin: &str, files: &[crate::plugins::FileMatches]) -> Section {
    let mut findings = Vec::new();
    for file in files {
        for (category, matches) in &file.categories {
            let severity = if category == "read_error" {
                Severity::Warning
            } else {
                Severity::Unknown
            };
            findings.push(Finding {
                plugin: plugin.to_string(),
                locator: Locator {
                    path: Some(file.path.clone()),
                    line: None,
                    column: None,
                },
                category: category.clone(),
                message: format!("{} occurrence(s)", matches.len()),
                severity,
                evidence: matches.clone(),
            });
        }
    }
    section(plugin, findings, None)
}

fn reduce_tool_issues(plugin: &str, issues: &[crate::plugins::ToolIssue]) -> Section {
    let findings = issues
        .iter()
        .map(|issue| Finding {
            plugin: plugin.to_string(),
            locator: Locator {
                path: issue.path.clone(),
                line: issue.line,
                column: issue.column,
            },
            category: issue.rule.clone(),
            message: issue.message.clone(),
            severity: issue.severity,
            evidence: Vec::new(),
        })
        .collect();
    section(plugin, findings, None)
}

/// One finding per vulnerability, tagged with the offending package pin;
/// the manifest feeds only the section header line.
fn reduce_dependency(
    plugin: &str,
    manifest: &[(String, String)],
    issues: &[crate::plugins::DependencyIssue],
) -> Section {
    let mut findings = Vec::new();
    for issue in issues {
        let pin = format!("{}@{}", issue.package, issue.version);
        for advisory in &issue.advisories {
            findings.push(Finding {
                plugin: plugin.to_string(),
                locator: Locator::default(),
                category: advisory.id.clone(),
                message: format!("{}: {}", pin, advisory.description),
                severity: Severity::from_tool_scale(&advisory.severity),
                evidence: vec![pin.clone()],
            });
        }
    }
    let note = format!("{} package(s) declared in manifest", manifest.len());
    section(plugin, findings, Some(note))
}

fn section(plugin: &str, findings: Vec<Finding>, manifest_note: Option<String>) -> Section {
    Section {
        plugin: plugin.to_string(),
        issue_count: findings.len(),
        manifest_note,
        findings,
        raw: None,
    }
}
