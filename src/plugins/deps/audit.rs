//! External audit tool invocations for the dependency plugin.
//!
//! Both tools run against synthesized temporary manifests and are strictly
//! best-effort: a missing tool or a failed run contributes no issues and a
//! warning, never a fatal error.

use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::plugins::deps::{render_requirement, Dependency};
use crate::plugins::{Advisory, DependencyIssue};

/// Diagnostic marker pip-audit emits on conflicting requirement sets.
const RESOLUTION_CONFLICT_MARKER: &str = "ResolutionImpossible";

#[derive(Debug, Deserialize)]
struct PipAuditReport {
    #[serde(default)]
    dependencies: Vec<PipAuditDependency>,
}

#[derive(Debug, Deserialize)]
struct PipAuditDependency {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    vulns: Vec<PipAuditVuln>,
}

#[derive(Debug, Deserialize)]
struct PipAuditVuln {
    id: String,
    #[serde(default)]
    description: String,
}

/// Run pip-audit against a synthesized requirements file. Output JSON is
/// parsed regardless of exit code; a resolution conflict on stderr becomes
/// a synthetic medium-severity issue instead of vanishing.
pub fn pip_audit(program: &str, deps: &[Dependency]) -> Vec<DependencyIssue> {
    if deps.is_empty() {
        return Vec::new();
    }

    let mut requirements = match tempfile::NamedTempFile::with_suffix(".txt") {
        Ok(file) => file,
        Err(err) => {
            warn!(%err, "could not create temporary requirements file");
            return Vec::new();
        }
    };
    for dep in deps {
        if writeln!(requirements, "{}", render_requirement(dep)).is_err() {
            warn!("could not write temporary requirements file");
            return Vec::new();
        }
    }

    info!(count = deps.len(), "running pip-audit");
    let output = match Command::new(program)
        .arg("--requirement")
        .arg(requirements.path())
        .args(["--format", "json"])
        .output()
    {
        Ok(output) => output,
        Err(err) => {
            warn!(%err, "pip-audit not available, skipping python dependency audit");
            return Vec::new();
        }
    };

    match serde_json::from_slice::<PipAuditReport>(&output.stdout) {
        Ok(report) => report
            .dependencies
            .into_iter()
            .filter(|dep| !dep.vulns.is_empty())
            .map(|dep| DependencyIssue {
                package: dep.name,
                version: dep.version,
                advisories: dep
                    .vulns
                    .into_iter()
                    .map(|vuln| Advisory {
                        id: vuln.id,
                        description: vuln.description,
                        // pip-audit reports no severity of its own.
                        severity: "high".to_string(),
                    })
                    .collect(),
            })
            .collect(),
        Err(_) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains(RESOLUTION_CONFLICT_MARKER) {
                warn!("pip-audit failed on conflicting dependencies");
                vec![resolution_conflict_issue()]
            } else {
                warn!(stderr = %stderr.trim(), "pip-audit produced no parseable output");
                Vec::new()
            }
        }
    }
}

fn resolution_conflict_issue() -> DependencyIssue {
    DependencyIssue {
        package: "requirements".to_string(),
        version: "N/A".to_string(),
        advisories: vec![Advisory {
            id: "DEPENDENCY_CONFLICT".to_string(),
            description: "Conflicting dependencies detected. This could mask security issues."
                .to_string(),
            severity: "medium".to_string(),
        }],
    }
}

#[derive(Debug, Deserialize)]
struct NpmAuditReport {
    #[serde(default)]
    advisories: std::collections::HashMap<String, NpmAdvisory>,
}

#[derive(Debug, Deserialize)]
struct NpmAdvisory {
    module_name: String,
    #[serde(default)]
    findings: Vec<NpmFinding>,
    #[serde(default)]
    github_advisory_id: Option<String>,
    #[serde(default)]
    cve: Option<String>,
    #[serde(default)]
    overview: String,
    #[serde(default)]
    severity: String,
}

#[derive(Debug, Deserialize)]
struct NpmFinding {
    #[serde(default)]
    version: String,
}

/// Run `npm install` + `npm audit --json` against a synthesized package
/// manifest in an ephemeral directory.
pub fn npm_audit(program: &str, deps: &[Dependency]) -> Vec<DependencyIssue> {
    if deps.is_empty() {
        return Vec::new();
    }

    let temp = match tempfile::tempdir() {
        Ok(temp) => temp,
        Err(err) => {
            warn!(%err, "could not create temporary directory for npm audit");
            return Vec::new();
        }
    };

    let manifest = json!({
        "name": "temp-audit-pkg",
        "version": "1.0.0",
        "dependencies": deps
            .iter()
            .map(|(name, version)| {
                let version = if version.is_empty() { "latest" } else { version };
                (name.clone(), version.to_string())
            })
            .collect::<std::collections::HashMap<_, _>>(),
    });
    if let Err(err) = fs::write(temp.path().join("package.json"), manifest.to_string()) {
        warn!(%err, "could not write temporary package.json");
        return Vec::new();
    }

    info!(count = deps.len(), "running npm audit");
    let install = Command::new(program)
        .args(["install", "--prefix"])
        .arg(temp.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match install {
        Ok(status) if status.success() => {}
        Ok(status) => {
            warn!(code = ?status.code(), "npm install failed, skipping node dependency audit");
            return Vec::new();
        }
        Err(err) => {
            warn!(%err, "npm not available, skipping node dependency audit");
            return Vec::new();
        }
    }

    let output = match Command::new(program)
        .args(["audit", "--json", "--prefix"])
        .arg(temp.path())
        .output()
    {
        Ok(output) => output,
        Err(err) => {
            warn!(%err, "npm audit failed to run");
            return Vec::new();
        }
    };

    match serde_json::from_slice::<NpmAuditReport>(&output.stdout) {
        Ok(report) => report
            .advisories
            .into_values()
            .map(|advisory| DependencyIssue {
                package: advisory.module_name,
                version: advisory
                    .findings
                    .first()
                    .map(|f| f.version.clone())
                    .unwrap_or_default(),
                advisories: vec![Advisory {
                    id: advisory
                        .github_advisory_id
                        .or(advisory.cve)
                        .unwrap_or_else(|| "UNKNOWN".to_string()),
                    description: advisory.overview,
                    severity: advisory.severity,
                }],
            })
            .collect(),
        Err(err) => {
            warn!(%err, "could not parse npm audit JSON output");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_pip_audit_degrades_to_empty() {
        let deps = vec![("requests".to_string(), "2.10.0".to_string())];
        let issues = pip_audit("reposcan-no-such-tool", &deps);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_no_deps_means_no_invocation() {
        assert!(pip_audit("reposcan-no-such-tool", &[]).is_empty());
        assert!(npm_audit("reposcan-no-such-tool", &[]).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolution_conflict_marker_yields_synthetic_issue() {
        use std::os::unix::fs::PermissionsExt;

        // Stand-in for pip-audit choking on an unsatisfiable requirement
        // set: nothing parseable on stdout, the marker on stderr.
        let dir = tempfile::TempDir::new().unwrap();
        let stub = dir.path().join("pip-audit-stub");
        fs::write(
            &stub,
            "#!/bin/sh\necho 'ERROR: ResolutionImpossible: conflicting pins' >&2\nexit 1\n",
        )
        .unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();

        let deps = vec![
            ("requests".to_string(), "2.10.0".to_string()),
            ("urllib3".to_string(), "2.0.0".to_string()),
        ];
        let issues = pip_audit(stub.to_str().unwrap(), &deps);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].package, "requirements");
        assert_eq!(issues[0].advisories[0].id, "DEPENDENCY_CONFLICT");
        assert_eq!(issues[0].advisories[0].severity, "medium");
    }

    #[cfg(unix)]
    #[test]
    fn test_unparseable_output_without_marker_yields_nothing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let stub = dir.path().join("pip-audit-stub");
        fs::write(&stub, "#!/bin/sh\necho 'some other failure' >&2\nexit 1\n").unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();

        let deps = vec![("requests".to_string(), "2.10.0".to_string())];
        assert!(pip_audit(stub.to_str().unwrap(), &deps).is_empty());
    }

    #[test]
    fn test_parse_pip_audit_report_shape() {
        let raw = r#"{
            "dependencies": [
                {"name": "requests", "version": "2.10.0", "vulns": [
                    {"id": "PYSEC-2018-28", "description": "credentials leak"}
                ]},
                {"name": "click", "version": "8.1.0", "vulns": []}
            ]
        }"#;
        let report: PipAuditReport = serde_json::from_str(raw).unwrap();
        let vulnerable: Vec<_> = report
            .dependencies
            .iter()
            .filter(|d| !d.vulns.is_empty())
            .collect();
        assert_eq!(vulnerable.len(), 1);
        assert_eq!(vulnerable[0].name, "requests");
        assert_eq!(vulnerable[0].vulns[0].id, "PYSEC-2018-28");
    }

    #[test]
    fn test_parse_npm_audit_report_shape() {
        let raw = r#"{
            "advisories": {
                "118": {
                    "module_name": "left-pad",
                    "findings": [{"version": "1.3.0"}],
                    "github_advisory_id": "GHSA-xxxx",
                    "overview": "something bad",
                    "severity": "moderate"
                }
            }
        }"#;
        let report: NpmAuditReport = serde_json::from_str(raw).unwrap();
        let advisory = report.advisories.get("118").unwrap();
        assert_eq!(advisory.module_name, "left-pad");
        assert_eq!(advisory.severity, "moderate");
    }

    #[test]
    fn test_resolution_conflict_issue_shape() {
        let issue = resolution_conflict_issue();
        assert_eq!(issue.package, "requirements");
        assert_eq!(issue.advisories[0].id, "DEPENDENCY_CONFLICT");
        assert_eq!(issue.advisories[0].severity, "medium");
    }
}
