use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::KitmigError;

fn test_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^.*\.(vitest|test|spec)\.[tj]sx?$").expect("test file pattern is valid")
    })
}

/// True for file names ending in `.test.`, `.spec.` or `.vitest.` followed
/// by a ts/js extension (tsx/jsx included).
pub fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| test_file_pattern().is_match(name))
}

/// Every candidate test file below `root`, in a stable order.
pub fn collect_test_files(root: &Path) -> Result<Vec<PathBuf>, KitmigError> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();

    while let Some(directory) = pending.pop() {
        let entries = std::fs::read_dir(&directory)
            .map_err(|error| KitmigError::io(&directory, error))?;

        for entry in entries {
            let entry = entry.map_err(|error| KitmigError::io(&directory, error))?;
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_test_file(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
