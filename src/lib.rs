pub mod batch;
pub mod client;
pub mod decoder;
pub mod discovery;
pub mod error;
pub mod invoker;
pub mod session;
pub mod tag;

pub use batch::{run_batch, BatchOperation, BatchOptions, BatchResult, BatchSummary};
pub use client::{ExifToolClient, WriteMode, WriteOutcome};
pub use error::{MetaError, MetaResult};
pub use session::{GroupFilter, MetadataSession};
pub use tag::{TagCategory, TagEntry, TagId, TagRef};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "exif_meta_link.json";

/// User preferences the core needs from the surrounding application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaConfig {
    /// User-selected ExifTool location, tried after a bundled copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_path: Option<PathBuf>,
    /// Bulk saves and strips overwrite without a backup when set.
    #[serde(default)]
    pub overwrite_original: bool,
    /// Single-tag adds keep their own mode, independent of the bulk flag.
    #[serde(default)]
    pub add_tag_mode: WriteMode,
}

impl MetaConfig {
    pub fn bulk_write_mode(&self) -> WriteMode {
        WriteMode::from_overwrite(self.overwrite_original)
    }
}

/// Missing or unreadable config yields defaults.
pub fn load_config(path: &Path) -> MetaConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return MetaConfig::default(),
    };

    serde_json::from_str(&content).unwrap_or_else(|error| {
        log::warn!("Ignoring invalid config {}: {}", path.display(), error);
        MetaConfig::default()
    })
}

pub fn persist_config(path: &Path, config: &MetaConfig) -> MetaResult<()> {
    let payload = serde_json::to_string_pretty(config)
        .map_err(|error| MetaError::Config(format!("Failed to serialize config: {}", error)))?;

    std::fs::write(path, payload).map_err(|error| {
        MetaError::Config(format!(
            "Failed to save config to {}: {}",
            path.display(),
            error
        ))
    })
}
