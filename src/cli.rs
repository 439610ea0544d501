use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;

use crate::error::KitmigError;
use crate::format;
use crate::guard::MigrationKind;
use crate::migrations;
use crate::tree::SourceTree;
use crate::walk;

#[derive(Debug, Parser)]
#[command(name = "kitmig")]
#[command(about = "Migrates effector test files to the shared testKit API")]
#[command(
    long_about = "Rewrites deprecated effector testing primitives in *.test/*.spec/*.vitest files: fork() scopes become testKit.fork() destructurings and createWatch registrations become derived watcher bindings."
)]
pub struct Cli {
    #[arg(value_name = "PATH", help = "Test file or directory to migrate")]
    pub path: PathBuf,
    #[arg(long, help = "Rewrite in memory without writing files back")]
    pub dry_run: bool,
    #[arg(long, help = "Do not echo rewritten file contents")]
    pub silent: bool,
    #[arg(
        long,
        value_delimiter = ',',
        value_name = "KIND",
        help = "Apply only the listed migrations (fork, create-watch)"
    )]
    pub only: Vec<MigrationKind>,
    #[arg(long, help = "Skip the prettier post-pass")]
    pub skip_format: bool,
    #[arg(long, help = "Report the run summary as JSON")]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub summary: RunSummary,
    pub files: Vec<FileOutcome>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub scanned: usize,
    pub patched: usize,
    pub failed: usize,
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub patched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub enum RunOutput {
    Text(String),
    Json(RunResponse),
}

pub fn run(cli: Cli) -> Result<RunOutput, KitmigError> {
    let is_directory = cli.path.is_dir();

    let outcomes = if cli.path.is_file() {
        let patched = process_file(&cli.path, &cli)?;
        vec![FileOutcome {
            path: cli.path.clone(),
            patched,
            error: None,
        }]
    } else if is_directory {
        process_directory(&cli.path, &cli)?
    } else {
        return Err(KitmigError::InvalidPath {
            path: cli.path.display().to_string(),
        });
    };

    if !cli.skip_format && !cli.dry_run {
        eprintln!("Running formatter on project");
        format::format_project_based_on(&cli.path)?;
    }

    let summary = RunSummary {
        scanned: outcomes.len(),
        patched: outcomes.iter().filter(|outcome| outcome.patched).count(),
        failed: outcomes
            .iter()
            .filter(|outcome| outcome.error.is_some())
            .count(),
        dry_run: cli.dry_run,
    };

    if cli.json {
        return Ok(RunOutput::Json(RunResponse {
            summary,
            files: outcomes,
        }));
    }

    if is_directory {
        return Ok(RunOutput::Text(format!("Patched {} files", summary.patched)));
    }

    Ok(RunOutput::Text(String::new()))
}

/// Rewrites one candidate file. The rewritten text is echoed unless silenced
/// and written back unless this is a dry run.
fn process_file(path: &Path, cli: &Cli) -> Result<bool, KitmigError> {
    if !walk::is_test_file(path) {
        return Err(KitmigError::NotATestFile {
            path: path.display().to_string(),
        });
    }

    let bytes = fs::read(path).map_err(|error| KitmigError::io(path, error))?;
    let text = String::from_utf8(bytes).map_err(|_| KitmigError::NonUtf8 {
        path: path.display().to_string(),
    })?;

    let mut tree = SourceTree::parse(path, text)?;
    let changed = migrations::run_migrations(&mut tree, &cli.only)?;

    if !cli.silent {
        println!("{}", tree.source());
    }
    if !cli.dry_run && changed {
        fs::write(path, tree.source()).map_err(|error| KitmigError::io(path, error))?;
    }

    Ok(changed)
}

/// Processes every candidate below `root`. Each file is its own isolation
/// boundary: a failure is reported and counted, the batch keeps going.
fn process_directory(root: &Path, cli: &Cli) -> Result<Vec<FileOutcome>, KitmigError> {
    let files = walk::collect_test_files(root)?;
    let mut outcomes = Vec::with_capacity(files.len());

    for file in files {
        match process_file(&file, cli) {
            Ok(patched) => outcomes.push(FileOutcome {
                path: file,
                patched,
                error: None,
            }),
            Err(error) => {
                eprintln!("kitmig: {}: {error}", file.display());
                outcomes.push(FileOutcome {
                    path: file,
                    patched: false,
                    error: Some(error.to_string()),
                });
            }
        }
    }

    Ok(outcomes)
}
