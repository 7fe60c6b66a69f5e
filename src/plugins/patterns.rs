//! Regex-based suspicious-pattern scanner.
//!
//! Broad heuristics by design: the tables favor recall over precision and
//! will flag benign code. Language-specific tables are merged on top of the
//! common table based on file extension.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::collect::{self, DEFAULT_EXTENSIONS};
use crate::error::PluginError;
use crate::plugins::{FileMatches, PluginPayload, ScanPlugin};
use crate::source::fetch::MaterializedSource;

type PatternTable = Vec<(&'static str, Regex)>;

fn pattern(name: &'static str, expr: &str) -> (&'static str, Regex) {
    (name, Regex::new(expr).expect("pattern table entry compiles"))
}

static COMMON_PATTERNS: LazyLock<PatternTable> = LazyLock::new(|| {
    vec![
        pattern("http_url", r#"https?://[^\s'"]+"#),
        pattern("eval_call", r"\beval\s*\("),
        pattern("exec_call", r"\bexec\s*\("),
        pattern("code_import", r"(importlib\.import_module|__import__|import )"),
        // Naive IPv4 match, no octet range validation.
        pattern("ip_address", r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b"),
        pattern(
            "email_address",
            r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}",
        ),
        pattern("keylogger_keyword", r"\bkeylog(ger)?\b"),
        pattern(
            "vm_related_terms",
            r"\b(virtualbox|vmware|sandbox|qemu|debugger)\b",
        ),
    ]
});

static PYTHON_PATTERNS: LazyLock<PatternTable> = LazyLock::new(|| {
    vec![
        pattern("py_import_smtplib", r"\bimport\s+smtplib\b"),
        pattern("py_import_socket", r"\bimport\s+socket\b"),
        pattern("py_import_pynput", r"\bimport\s+pynput\b"),
        pattern("py_import_keyboard", r"\bimport\s+keyboard\b"),
        pattern("py_import_subprocess", r"\bimport\s+subprocess\b"),
        pattern("py_subprocess_call", r"subprocess\.(run|Popen|check_output)\("),
        pattern("py_import_requests", r"\bimport\s+requests\b"),
    ]
});

static JAVASCRIPT_PATTERNS: LazyLock<PatternTable> = LazyLock::new(|| {
    vec![
        pattern("js_require_net", r#"require\(['"]net['"]\)"#),
        pattern("js_require_child_process", r#"require\(['"]child_process['"]\)"#),
        pattern("js_require_nodemailer", r#"require\(['"]nodemailer['"]\)"#),
        pattern("js_new_function_call", r"new\s+Function\s*\("),
    ]
});

/// Tables applied to one file: always the common table, plus the table for
/// the file's language when there is one.
fn tables_for(path: &Path) -> Vec<&'static PatternTable> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "py" => vec![&COMMON_PATTERNS, &PYTHON_PATTERNS],
        "js" | "jsx" | "ts" | "tsx" => vec![&COMMON_PATTERNS, &JAVASCRIPT_PATTERNS],
        _ => vec![&COMMON_PATTERNS],
    }
}

#[derive(Debug, Default)]
pub struct PatternPlugin;

impl ScanPlugin for PatternPlugin {
    fn name(&self) -> &'static str {
        "patterns"
    }

    fn scan(&self, source: &MaterializedSource) -> Result<PluginPayload, PluginError> {
        let mut files = Vec::new();

        for path in collect::collect(source, DEFAULT_EXTENSIONS) {
            let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();

            match fs::read_to_string(&path) {
                Ok(content) => {
                    for table in tables_for(&path) {
                        for (name, regex) in table.iter() {
                            let matches: Vec<String> = regex
                                .find_iter(&content)
                                .map(|m| m.as_str().to_string())
                                .collect();
                            if !matches.is_empty() {
                                debug!(pattern = name, path = %path.display(), count = matches.len(), "pattern matched");
                                categories.insert((*name).to_string(), matches);
                            }
                        }
                    }
                }
                Err(err) => {
                    // Keep scanning other files; the unreadable one shows up
                    // as its own entry.
                    warn!(path = %path.display(), %err, "could not read file");
                    categories.insert("read_error".to_string(), vec![err.to_string()]);
                }
            }

            if !categories.is_empty() {
                files.push(FileMatches { path, categories });
            }
        }

        Ok(PluginPayload::Patterns(files))
    }

    fn empty_payload(&self) -> PluginPayload {
        PluginPayload::Patterns(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fetch::SourceKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn scan_dir(dir: &TempDir) -> Vec<FileMatches> {
        let source =
            MaterializedSource::persistent(dir.path().to_path_buf(), SourceKind::Directory);
        match PatternPlugin.scan(&source).unwrap() {
            PluginPayload::Patterns(files) => files,
            other => panic!("expected Patterns payload, got {other:?}"),
        }
    }

    #[test]
    fn test_flags_eval_call_in_python_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("sus.py"), "x = \"1 + 1\"\neval(x)\n").unwrap();

        let files = scan_dir(&dir);
        assert_eq!(files.len(), 1);
        let matches = files[0].categories.get("eval_call").unwrap();
        assert_eq!(matches, &vec!["eval(".to_string()]);
    }

    #[test]
    fn test_python_table_only_applies_to_python_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.js"), "import smtplib\n").unwrap();
        std::fs::write(dir.path().join("b.py"), "import smtplib\n").unwrap();

        let files = scan_dir(&dir);
        let js = files.iter().find(|f| f.path.ends_with("a.js")).unwrap();
        assert!(!js.categories.contains_key("py_import_smtplib"));
        let py = files.iter().find(|f| f.path.ends_with("b.py")).unwrap();
        assert!(py.categories.contains_key("py_import_smtplib"));
    }

    #[test]
    fn test_javascript_require_patterns() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("c.js"),
            "const cp = require('child_process');\nconst f = new Function('return 1');\n",
        )
        .unwrap();

        let files = scan_dir(&dir);
        let categories = &files[0].categories;
        assert!(categories.contains_key("js_require_child_process"));
        assert!(categories.contains_key("js_new_function_call"));
    }

    #[test]
    fn test_clean_file_produces_no_entry() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("clean.py"), "def add(a, b):\n    return a + b\n")
            .unwrap();
        assert!(scan_dir(&dir).is_empty());
    }
}
