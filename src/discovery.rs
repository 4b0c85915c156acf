//! Locates the ExifTool executable. The rest of the crate only ever sees the
//! resolved path.

use crate::error::{MetaError, MetaResult};
use crate::invoker::ToolInvoker;
use std::env;
use std::path::{Path, PathBuf};

/// Environment override for the tool location.
pub const TOOL_PATH_ENV: &str = "EXIF_META_LINK_TOOL";

#[cfg(target_os = "windows")]
const TOOL_FILE_NAME: &str = "exiftool.exe";
#[cfg(not(target_os = "windows"))]
const TOOL_FILE_NAME: &str = "exiftool";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    pub path: PathBuf,
    pub version: String,
}

/// Search order: bundled copy, user override, fixed system paths, then `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    bundled: Option<PathBuf>,
    user_override: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
}

impl ToolLocator {
    /// Locator with the platform's standard install locations and `PATH`.
    pub fn system() -> Self {
        let mut search_paths = default_search_paths();
        if let Some(path_var) = env::var_os("PATH") {
            search_paths.extend(env::split_paths(&path_var).map(|dir| dir.join(TOOL_FILE_NAME)));
        }
        Self {
            bundled: None,
            user_override: None,
            search_paths,
        }
    }

    pub fn with_bundled(mut self, path: impl Into<PathBuf>) -> Self {
        self.bundled = Some(path.into());
        self
    }

    /// Explicit user choice; falls back to the environment override when
    /// `path` is `None`.
    pub fn with_user_override(mut self, path: Option<PathBuf>) -> Self {
        self.user_override = path.or_else(|| env::var_os(TOOL_PATH_ENV).map(PathBuf::from));
        self
    }

    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    pub fn candidates(&self) -> Vec<PathBuf> {
        self.bundled
            .iter()
            .chain(self.user_override.iter())
            .chain(self.search_paths.iter())
            .filter(|path| !path.as_os_str().is_empty())
            .cloned()
            .collect()
    }

    pub fn locate(&self) -> MetaResult<PathBuf> {
        let candidates = self.candidates();
        match candidates.iter().find(|path| is_executable_file(path)) {
            Some(path) => {
                log::info!("Using ExifTool at {}", path.display());
                Ok(path.clone())
            }
            None => {
                log::warn!(
                    "ExifTool not found. Checked: {}",
                    candidates
                        .iter()
                        .map(|path| path.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                Err(MetaError::ToolNotFound)
            }
        }
    }

    /// Locates the tool and confirms it runs by asking for its version.
    pub fn resolve(&self) -> MetaResult<ResolvedTool> {
        let path = self.locate()?;
        let version = ToolInvoker::new(path.clone()).version()?;
        Ok(ResolvedTool { path, version })
    }
}

fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\Windows\exiftool.exe"));
        if let Some(program_files) = env::var_os("ProgramFiles") {
            paths.push(
                PathBuf::from(program_files)
                    .join("ExifTool")
                    .join(TOOL_FILE_NAME),
            );
        }
    }
    #[cfg(not(target_os = "windows"))]
    {
        paths.push(PathBuf::from("/usr/local/bin").join(TOOL_FILE_NAME));
        paths.push(PathBuf::from("/opt/homebrew/bin").join(TOOL_FILE_NAME));
        paths.push(PathBuf::from("/usr/bin").join(TOOL_FILE_NAME));
    }
    paths
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
