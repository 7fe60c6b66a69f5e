use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::ReportError;
use crate::report::{Report, Section};

/// Render the report as a Markdown document. Sections appear in plugin
/// registration order; zero-finding sections carry an explicit marker.
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Scan Report\n");
    let _ = writeln!(out, "Source: `{}`\n", report.source);
    let _ = writeln!(
        out,
        "**Summary:** {} issue(s) across {} plugin(s).\n",
        report.total_issues(),
        report.sections.len()
    );

    for section in &report.sections {
        render_section(&mut out, section);
    }

    out
}

fn render_section(out: &mut String, section: &Section) {
    let _ = writeln!(
        out,
        "## {} ({} issue(s))\n",
        section.plugin, section.issue_count
    );

    if let Some(note) = &section.manifest_note {
        let _ = writeln!(out, "{note}\n");
    }

    if let Some(raw) = &section.raw {
        let dump = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
        let _ = writeln!(out, "```json\n{dump}\n```\n");
        return;
    }

    if section.findings.is_empty() {
        let _ = writeln!(out, "No issues found.\n");
        return;
    }

    for finding in &section.findings {
        let mut location = String::new();
        if let Some(path) = &finding.locator.path {
            location.push_str(&format!(" `{}`", path.display()));
        }
        if let Some(line) = finding.locator.line {
            match finding.locator.column {
                Some(column) => location.push_str(&format!(" line {line}:{column}")),
                None => location.push_str(&format!(" line {line}")),
            }
        }
        let _ = writeln!(
            out,
            "- **{}** [{}]{}: {}",
            finding.category, finding.severity, location, finding.message
        );
        for item in &finding.evidence {
            let _ = writeln!(out, "  - `{}`", truncate(item, 120));
        }
    }
    let _ = writeln!(out);
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{cut}…")
}

/// Derive a filesystem-safe name from the source description: keeps
/// alphanumerics plus `._-`, everything else collapses to single dashes.
pub fn sanitize_source_name(source: &str) -> String {
    let mut name = String::new();
    let mut last_dash = false;
    for c in source.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            name.push(c);
            last_dash = false;
        } else if !last_dash {
            name.push('-');
            last_dash = true;
        }
    }
    let trimmed = name.trim_matches('-');
    if trimmed.is_empty() {
        "scan".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Write the rendered report under `dir` (created if absent) as
/// `<sanitized-source>-<utc timestamp>.md` and return the path.
pub fn write_report(report: &Report, dir: &Path) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(dir).map_err(|e| ReportError::CreateDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let file_name = format!("{}-{}.md", sanitize_source_name(&report.source), stamp);
    let path = dir.join(file_name);

    fs::write(&path, render_markdown(report)).map_err(|e| ReportError::Write {
        path: path.clone(),
        source: e,
    })?;
    info!(path = %path.display(), "report written");
    Ok(path)
}
