//! Runs the external metadata tool and classifies its result.

use crate::error::{MetaError, MetaResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Raw result of one tool process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub status_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }
}

/// Launches one process for the given program and argument vector.
pub trait ToolRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> MetaResult<CommandOutput>;
}

/// Production runner backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> MetaResult<CommandOutput> {
        let output = match tool_command(program).args(args).output() {
            Ok(output) => output,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(MetaError::ToolNotFound);
            }
            Err(error) => return Err(MetaError::Io(error)),
        };

        Ok(CommandOutput {
            status_code: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn tool_command(program: &Path) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        // CREATE_NO_WINDOW
        cmd.creation_flags(0x08000000);
    }
    cmd
}

/// Invokes the tool at a resolved path. Every call spawns a fresh process and
/// blocks until it exits.
#[derive(Debug, Clone)]
pub struct ToolInvoker<R = SystemRunner> {
    tool_path: PathBuf,
    runner: R,
}

impl ToolInvoker<SystemRunner> {
    pub fn new(tool_path: impl Into<PathBuf>) -> Self {
        Self::with_runner(tool_path, SystemRunner)
    }
}

impl<R: ToolRunner> ToolInvoker<R> {
    pub fn with_runner(tool_path: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            tool_path: tool_path.into(),
            runner,
        }
    }

    pub fn tool_path(&self) -> &Path {
        &self.tool_path
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Runs the tool and returns its stdout.
    pub fn execute(&self, args: &[OsString]) -> MetaResult<Vec<u8>> {
        if self.tool_path.as_os_str().is_empty() {
            return Err(MetaError::ToolNotFound);
        }

        log::debug!(
            "exiftool {}",
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        let output = self.runner.run(&self.tool_path, args)?;
        classify_output(output)
    }

    /// Runs the tool and returns stdout as lossy, trimmed text.
    pub fn execute_text(&self, args: &[OsString]) -> MetaResult<String> {
        let stdout = self.execute(args)?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    /// Version string reported by `-ver`.
    pub fn version(&self) -> MetaResult<String> {
        self.execute_text(&[OsString::from("-ver")])
    }
}

/// Decides whether a finished process failed.
///
/// ExifTool exits non-zero for warnings as well as hard errors, so the exit
/// code alone is not trusted: a call only fails when the exit is non-zero,
/// stderr is non-empty, and stderr mentions "error" (any casing). This
/// depends on the tool's English wording.
pub fn classify_output(output: CommandOutput) -> MetaResult<Vec<u8>> {
    if output.success() {
        return Ok(output.stdout);
    }

    let stderr = output.stderr.trim();
    if !stderr.is_empty() && stderr.to_lowercase().contains("error") {
        return Err(MetaError::ExecutionFailed(stderr.to_string()));
    }

    log::warn!(
        "ExifTool exited with status {:?}, treating as success: {}",
        output.status_code,
        stderr
    );
    Ok(output.stdout)
}
