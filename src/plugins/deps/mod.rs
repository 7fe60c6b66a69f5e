//! Dependency manifest discovery and vulnerability lookups.
//!
//! Walks the materialized root for dependency-declaration files
//! (`requirements.txt`, `pyproject.toml`, `package.json`), parses every
//! declared package, and feeds the result through the external audit tools.
//! Manifest scanning is repo-wide; individual source files are not
//! cross-checked against the manifests.

mod audit;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::PluginError;
use crate::plugins::{PluginPayload, ScanPlugin};
use crate::source::fetch::MaterializedSource;

/// A dependency pin: package name plus version spec. The spec is empty for
/// an unversioned declaration and keeps its `>=` prefix for minimums.
pub type Dependency = (String, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestKind {
    Requirements,
    Pyproject,
    PackageJson,
}

#[derive(Debug)]
struct Manifest {
    path: PathBuf,
    kind: ManifestKind,
    dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone)]
pub struct DependencyPlugin {
    pip_audit: String,
    npm: String,
}

impl Default for DependencyPlugin {
    fn default() -> Self {
        Self {
            pip_audit: "pip-audit".to_string(),
            npm: "npm".to_string(),
        }
    }
}

impl DependencyPlugin {
    pub fn with_programs(pip_audit: impl Into<String>, npm: impl Into<String>) -> Self {
        Self {
            pip_audit: pip_audit.into(),
            npm: npm.into(),
        }
    }
}

impl ScanPlugin for DependencyPlugin {
    fn name(&self) -> &'static str {
        "dependency-audit"
    }

    fn scan(&self, source: &MaterializedSource) -> Result<PluginPayload, PluginError> {
        let manifests = discover_manifests(source.root());
        let total: usize = manifests.iter().map(|m| m.dependencies.len()).sum();
        info!(
            manifests = manifests.len(),
            dependencies = total,
            "discovered dependency manifests"
        );

        let mut python_deps: Vec<Dependency> = Vec::new();
        let mut node_deps: Vec<Dependency> = Vec::new();
        for manifest in &manifests {
            debug!(
                path = %manifest.path.display(),
                count = manifest.dependencies.len(),
                "queueing manifest for audit"
            );
            match manifest.kind {
                ManifestKind::Requirements | ManifestKind::Pyproject => {
                    python_deps.extend(manifest.dependencies.iter().cloned())
                }
                ManifestKind::PackageJson => {
                    node_deps.extend(manifest.dependencies.iter().cloned())
                }
            }
        }

        let mut issues = audit::pip_audit(&self.pip_audit, &python_deps);
        issues.extend(audit::npm_audit(&self.npm, &node_deps));

        let mut seen = std::collections::HashSet::new();
        let manifest: Vec<Dependency> = python_deps
            .into_iter()
            .chain(node_deps)
            .filter(|(name, _)| seen.insert(name.clone()))
            .collect();

        Ok(PluginPayload::Dependency { manifest, issues })
    }

    fn empty_payload(&self) -> PluginPayload {
        PluginPayload::Dependency {
            manifest: Vec::new(),
            issues: Vec::new(),
        }
    }
}

fn discover_manifests(root: &Path) -> Vec<Manifest> {
    let mut manifests = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let kind = match entry.file_name().to_string_lossy().as_ref() {
            "requirements.txt" => ManifestKind::Requirements,
            "pyproject.toml" => ManifestKind::Pyproject,
            "package.json" => ManifestKind::PackageJson,
            _ => continue,
        };

        let content = match fs::read_to_string(entry.path()) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %entry.path().display(), %err, "could not read manifest");
                continue;
            }
        };

        let dependencies = match kind {
            ManifestKind::Requirements => parse_requirements(&content),
            ManifestKind::Pyproject => parse_pyproject(&content),
            ManifestKind::PackageJson => parse_package_json(&content),
        };

        if !dependencies.is_empty() {
            info!(
                path = %entry.path().display(),
                count = dependencies.len(),
                "parsed dependency manifest"
            );
            manifests.push(Manifest {
                path: entry.into_path(),
                kind,
                dependencies,
            });
        }
    }
    manifests
}

/// Parse a requirements file. Three line forms are understood: `pkg==ver`,
/// `pkg>=ver` (the spec keeps its prefix), and a bare `pkg`.
pub fn parse_requirements(content: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, version)) = line.split_once("==") {
            deps.push((name.trim().to_string(), version.trim().to_string()));
        } else if let Some((name, version)) = line.split_once(">=") {
            deps.push((name.trim().to_string(), format!(">={}", version.trim())));
        } else {
            deps.push((line.to_string(), String::new()));
        }
    }
    deps
}

/// Render one dependency back into requirements-file syntax.
pub fn render_requirement(dep: &Dependency) -> String {
    let (name, version) = dep;
    if version.is_empty() {
        name.clone()
    } else if version.starts_with(">=") {
        format!("{name}{version}")
    } else {
        format!("{name}=={version}")
    }
}

/// Collects `[project.dependencies]` entries and
/// `[tool.poetry.dependencies]` pins, skipping the `python` constraint.
fn parse_pyproject(content: &str) -> Vec<Dependency> {
    let value: toml::Value = match content.parse() {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, "could not parse pyproject.toml");
            return Vec::new();
        }
    };

    let mut deps = Vec::new();

    if let Some(list) = value
        .get("project")
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_array())
    {
        for entry in list.iter().filter_map(|e| e.as_str()) {
            match entry.split_once(' ') {
                Some((name, version)) => {
                    deps.push((name.trim().to_string(), version.trim().to_string()))
                }
                None => deps.push((entry.trim().to_string(), String::new())),
            }
        }
    }

    if let Some(table) = value
        .get("tool")
        .and_then(|t| t.get("poetry"))
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_table())
    {
        for (name, version) in table {
            if name == "python" {
                continue;
            }
            let version = version.as_str().unwrap_or_default().to_string();
            deps.push((name.clone(), version));
        }
    }

    deps
}

/// Collects both `dependencies` and `devDependencies`.
fn parse_package_json(content: &str) -> Vec<Dependency> {
    let value: serde_json::Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, "could not parse package.json");
            return Vec::new();
        }
    };

    let mut deps = Vec::new();
    for key in ["dependencies", "devDependencies"] {
        if let Some(table) = value.get(key).and_then(|d| d.as_object()) {
            for (name, version) in table {
                let version = version.as_str().unwrap_or_default().to_string();
                deps.push((name.clone(), version));
            }
        }
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_requirements_three_forms() {
        let deps = parse_requirements("requests==2.10.0\nflask>=1.0\nclick\n");
        assert_eq!(
            deps,
            vec![
                ("requests".to_string(), "2.10.0".to_string()),
                ("flask".to_string(), ">=1.0".to_string()),
                ("click".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_parse_requirements_skips_comments_and_blanks() {
        let deps = parse_requirements("# pinned\n\nrequests==2.10.0\n");
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_requirements_round_trip() {
        let original = ["requests==2.10.0", "flask>=1.0", "click"];
        let parsed = parse_requirements(&original.join("\n"));
        let rendered: Vec<String> = parsed.iter().map(render_requirement).collect();
        assert_eq!(rendered, original);
    }

    #[test]
    fn test_parse_pyproject_project_and_poetry_tables() {
        let content = r#"
[project]
dependencies = ["requests >=2.0", "click"]

[tool.poetry.dependencies]
python = "^3.10"
flask = "2.3.2"
"#;
        let deps = parse_pyproject(content);
        assert!(deps.contains(&("requests".to_string(), ">=2.0".to_string())));
        assert!(deps.contains(&("click".to_string(), String::new())));
        assert!(deps.contains(&("flask".to_string(), "2.3.2".to_string())));
        assert!(!deps.iter().any(|(name, _)| name == "python"));
    }

    #[test]
    fn test_parse_package_json_includes_dev_dependencies() {
        let content = r#"{
            "name": "demo",
            "dependencies": {"left-pad": "1.3.0"},
            "devDependencies": {"mocha": "^10.0.0"}
        }"#;
        let deps = parse_package_json(content);
        assert!(deps.contains(&("left-pad".to_string(), "1.3.0".to_string())));
        assert!(deps.contains(&("mocha".to_string(), "^10.0.0".to_string())));
    }

    #[test]
    fn test_discover_manifests_walks_nested_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("svc")).unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "requests==2.10.0\n").unwrap();
        std::fs::write(
            dir.path().join("svc/package.json"),
            r#"{"dependencies": {"left-pad": "1.3.0"}}"#,
        )
        .unwrap();

        let manifests = discover_manifests(dir.path());
        assert_eq!(manifests.len(), 2);
        assert!(manifests
            .iter()
            .any(|m| m.kind == ManifestKind::Requirements
                && m.dependencies == vec![("requests".to_string(), "2.10.0".to_string())]));
        assert!(manifests.iter().any(|m| m.kind == ManifestKind::PackageJson));
        assert!(manifests.iter().all(|m| m.path.exists()));
    }

    #[test]
    fn test_scan_builds_deduplicated_manifest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("requirements.txt"),
            "requests==2.10.0\nrequests==2.10.0\n",
        )
        .unwrap();
        let source = MaterializedSource::persistent(
            dir.path().to_path_buf(),
            crate::source::fetch::SourceKind::Directory,
        );

        // Missing audit tools degrade to empty issue lists.
        let plugin = DependencyPlugin::with_programs(
            "reposcan-no-such-tool",
            "reposcan-no-such-tool",
        );
        match plugin.scan(&source).unwrap() {
            PluginPayload::Dependency { manifest, issues } => {
                assert_eq!(
                    manifest,
                    vec![("requests".to_string(), "2.10.0".to_string())]
                );
                assert!(issues.is_empty());
            }
            other => panic!("expected Dependency payload, got {other:?}"),
        }
    }
}
