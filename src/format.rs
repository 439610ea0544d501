use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::KitmigError;

/// Nearest ancestor directory carrying a package.json. Files resolve from
/// their parent directory.
pub fn project_root_for(path: &Path) -> Result<PathBuf, KitmigError> {
    let start = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(path)
    };

    let mut current = start;
    loop {
        if current.join("package.json").is_file() {
            return Ok(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => {
                return Err(KitmigError::ProjectRootMissing {
                    path: path.display().to_string(),
                });
            }
        }
    }
}

/// Runs prettier over `path` from the enclosing project root. A missing root
/// is fatal; a failing prettier process is only reported.
pub fn format_project_based_on(path: &Path) -> Result<(), KitmigError> {
    let root = project_root_for(path)?;

    let outcome = Command::new("npx")
        .arg("prettier")
        .arg("--write")
        .arg(path)
        .current_dir(&root)
        .output();

    match outcome {
        Ok(output) => eprintln!("prettier exited with {}", output.status),
        Err(error) => eprintln!("prettier failed to start: {error}"),
    }

    Ok(())
}
