//! Tree-sitter-backed scanner for dynamic code execution in Python.
//!
//! Flags calls to `eval`, `exec`, and `__import__` whose first argument is
//! not a plain string literal: a dynamically built argument is the shape
//! regex tables cannot judge.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use tree_sitter::{Node, Parser};

use crate::collect;
use crate::error::PluginError;
use crate::plugins::{PluginPayload, ScanPlugin, ToolIssue};
use crate::report::Severity;
use crate::source::fetch::MaterializedSource;

const DYNAMIC_CALLS: &[&str] = &["eval", "exec", "__import__"];

#[derive(Debug, Default)]
pub struct AstPlugin;

impl ScanPlugin for AstPlugin {
    fn name(&self) -> &'static str {
        "python-ast"
    }

    fn scan(&self, source: &MaterializedSource) -> Result<PluginPayload, PluginError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| PluginError::parser(e.to_string()))?;

        let mut issues = Vec::new();
        for path in collect::collect(source, &[".py"]) {
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    warn!(path = %path.display(), %err, "could not read file");
                    issues.push(ToolIssue {
                        path: Some(path),
                        line: None,
                        column: None,
                        rule: "read-error".to_string(),
                        message: err.to_string(),
                        severity: Severity::Warning,
                    });
                    continue;
                }
            };

            let tree = match parser.parse(&content, None) {
                Some(tree) => tree,
                None => {
                    debug!(path = %path.display(), "parser produced no tree, skipping");
                    continue;
                }
            };
            if tree.root_node().has_error() {
                debug!(path = %path.display(), "syntax errors in file, skipping");
                continue;
            }

            visit(tree.root_node(), content.as_bytes(), &path, &mut issues);
        }

        Ok(PluginPayload::ToolIssues(issues))
    }
}

fn visit(node: Node, src: &[u8], path: &Path, issues: &mut Vec<ToolIssue>) {
    if node.kind() == "call" {
        if let Some(issue) = check_call(node, src, path) {
            issues.push(issue);
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, src, path, issues);
    }
}

fn check_call(node: Node, src: &[u8], path: &Path) -> Option<ToolIssue> {
    let function = node.child_by_field_name("function")?;
    let name = match function.kind() {
        "identifier" => function.utf8_text(src).ok()?,
        "attribute" => function
            .child_by_field_name("attribute")?
            .utf8_text(src)
            .ok()?,
        _ => return None,
    };
    if !DYNAMIC_CALLS.contains(&name) {
        return None;
    }

    let arguments = node.child_by_field_name("arguments")?;
    let first = arguments.named_child(0)?;
    if first.kind() == "string" {
        return None;
    }

    let position = node.start_position();
    Some(ToolIssue {
        path: Some(path.to_path_buf()),
        line: Some(position.row as u32 + 1),
        column: Some(position.column as u32 + 1),
        rule: "dynamic-eval-exec-import".to_string(),
        message: format!("non-literal argument to {name}"),
        severity: Severity::Warning,
    })
}
