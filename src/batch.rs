//! Applies one operation across many files, one tool process per file.

use crate::client::{ExifToolClient, WriteMode, WriteOutcome};
use crate::error::MetaResult;
use crate::invoker::ToolRunner;
use crate::tag::TagRef;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Tag reference → value, applied identically to every file. An empty
    /// value deletes the tag.
    SetTags(BTreeMap<String, String>),
    StripAll,
    /// Copies every tag from `source` onto the other files. A listed file is
    /// the source when both canonicalize to the same path, or when either
    /// cannot be canonicalized and the raw paths are equal.
    CopyTags { source: PathBuf },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    pub write_mode: WriteMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub path: PathBuf,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failed_paths: Vec<String>,
}

impl BatchSummary {
    pub fn from_results(results: &[BatchResult]) -> Self {
        let failed_paths: Vec<String> = results
            .iter()
            .filter(|result| !result.success)
            .map(|result| format!("{} ({})", result.path.display(), result.message))
            .collect();
        Self {
            total: results.len(),
            succeeded: results.len() - failed_paths.len(),
            failed: failed_paths.len(),
            failed_paths,
        }
    }
}

/// Runs `operation` over `files` in order and reports one result per file
/// attempted. Per-file failures are recorded, never propagated.
pub fn run_batch<R: ToolRunner>(
    client: &ExifToolClient<R>,
    operation: &BatchOperation,
    files: &[PathBuf],
    options: &BatchOptions,
) -> Vec<BatchResult> {
    if files.is_empty() {
        return Vec::new();
    }

    match operation {
        BatchOperation::SetTags(tags) => {
            if tags.is_empty() {
                return Vec::new();
            }
            let message = format!("Updated {} tag(s)", tags.len());
            run_each(files, &message, |path| {
                let parsed = parse_tags(tags)?;
                client.set_tags(path, &parsed, options.write_mode)
            })
        }
        BatchOperation::StripAll => run_each(files, "Stripped all metadata", |path| {
            client.strip_all(path, options.write_mode)
        }),
        BatchOperation::CopyTags { source } => {
            let destinations: Vec<PathBuf> = files
                .iter()
                .filter(|path| !same_file(path, source))
                .cloned()
                .collect();
            let message = format!("Copied tags from {}", display_name(source));
            run_each(&destinations, &message, |path| {
                client.copy_tags(source, path, options.write_mode)
            })
        }
    }
}

fn run_each<F>(files: &[PathBuf], success_message: &str, mut apply: F) -> Vec<BatchResult>
where
    F: FnMut(&Path) -> MetaResult<WriteOutcome>,
{
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let result = match apply(path.as_path()) {
            Ok(outcome) => BatchResult {
                path: path.clone(),
                success: true,
                message: outcome_message(success_message, outcome),
            },
            Err(error) => {
                log::warn!("Batch item failed for {}: {}", path.display(), error);
                BatchResult {
                    path: path.clone(),
                    success: false,
                    message: error.to_string(),
                }
            }
        };
        results.push(result);
    }

    let summary = BatchSummary::from_results(&results);
    log::info!(
        "Batch finished: {} succeeded, {} failed",
        summary.succeeded,
        summary.failed
    );
    results
}

/// Appends the tool's own report, e.g. "1 image files updated".
fn outcome_message(success_message: &str, outcome: WriteOutcome) -> String {
    match outcome {
        WriteOutcome::Updated { message } if !message.is_empty() => {
            format!("{} ({})", success_message, message)
        }
        _ => success_message.to_string(),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn parse_tags(tags: &BTreeMap<String, String>) -> MetaResult<Vec<(TagRef, String)>> {
    tags.iter()
        .map(|(tag, value)| Ok((TagRef::parse(tag)?, value.clone())))
        .collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
