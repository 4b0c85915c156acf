use std::path::PathBuf;
use thiserror::Error;

pub type MetaResult<T> = Result<T, MetaError>;

/// Errors surfaced by tool invocation, output decoding and tag edits.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("ExifTool executable not found")]
    ToolNotFound,
    #[error("ExifTool reported an error: {0}")]
    ExecutionFailed(String),
    #[error("Failed to parse ExifTool output: {0}")]
    ParsingFailed(String),
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Tag is read-only: {0}")]
    WriteProtected(String),
    #[error("Invalid tag reference: {0:?}")]
    InvalidTag(String),
    #[error("Failed to launch ExifTool: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}
