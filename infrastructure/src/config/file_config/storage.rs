//! Storage and transcript log locations (`[storage]`, `[logging]` sections)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where discussions are persisted.
///
/// # Example
///
/// ```toml
/// [storage]
/// path = "./discussions.json"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    pub path: PathBuf,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

impl FileStorageConfig {
    /// `$XDG_DATA_HOME/roundtable/discussions.json`, or the working directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("roundtable"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("discussions.json")
    }
}

/// Structured transcript log.
///
/// # Example
///
/// ```toml
/// [logging]
/// conversation_log = "./roundtable.jsonl"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL file receiving run events; disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_log: Option<PathBuf>,
}
