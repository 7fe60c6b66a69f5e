use std::path::PathBuf;

use tracing::debug;
use walkdir::WalkDir;

use crate::source::fetch::{MaterializedSource, SourceKind};

/// Extensions scanned by default: the languages the pattern tables and
/// external tools know about.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".py", ".js", ".ts", ".jsx", ".tsx"];

/// Collect candidate files under the materialized root.
///
/// A single-file root is returned as-is regardless of extension: naming one
/// file is explicit intent. Directory roots are walked recursively keeping
/// names that end with an allowlisted extension, in a stable name-sorted
/// walk order.
pub fn collect(source: &MaterializedSource, extensions: &[&str]) -> Vec<PathBuf> {
    if source.kind() == SourceKind::File {
        return vec![source.root().to_path_buf()];
    }

    let files: Vec<PathBuf> = WalkDir::new(source.root())
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            extensions.iter().any(|ext| name.ends_with(ext))
        })
        .map(|e| e.into_path())
        .collect();

    debug!(root = %source.root().display(), count = files.len(), "collected candidate files");
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn dir_source(dir: &TempDir) -> MaterializedSource {
        MaterializedSource::persistent(dir.path().to_path_buf(), SourceKind::Directory)
    }

    #[test]
    fn test_collect_filters_by_extension() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.py"), "x = 1").unwrap();
        fs::write(dir.path().join("nested/b.js"), "var x;").unwrap();
        fs::write(dir.path().join("readme.md"), "# hi").unwrap();

        let files = collect(&dir_source(&dir), DEFAULT_EXTENSIONS);
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.ends_with("a.py")));
        assert!(files.iter().any(|f| f.ends_with("nested/b.js")));
    }

    #[test]
    fn test_collect_single_file_ignores_allowlist() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "hello").unwrap();
        let source = MaterializedSource::persistent(file.clone(), SourceKind::File);

        let files = collect(&source, DEFAULT_EXTENSIONS);
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_collect_is_idempotent_over_unchanged_tree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pkg/sub")).unwrap();
        fs::write(dir.path().join("pkg/a.py"), "1").unwrap();
        fs::write(dir.path().join("pkg/sub/b.py"), "2").unwrap();
        fs::write(dir.path().join("z.ts"), "3").unwrap();

        let source = dir_source(&dir);
        let first = collect(&source, DEFAULT_EXTENSIONS);
        let second = collect(&source, DEFAULT_EXTENSIONS);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_collect_empty_allowlist_matches_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1").unwrap();
        assert!(collect(&dir_source(&dir), &[]).is_empty());
    }
}
