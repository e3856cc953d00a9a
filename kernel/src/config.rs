//! Configuration for snapshot resolution.

use serde::{Deserialize, Serialize};

use crate::{DeltaResult, Error};

pub const DEFAULT_LOG_DIR_NAME: &str = "_delta_log";
pub const DEFAULT_CHECKPOINT_SEARCH_BATCH_SIZE: u64 = 1000;

/// Knobs of a [`SnapshotManager`](crate::snapshot_manager::SnapshotManager).
///
/// Deserializable from JSON with camelCase keys; missing keys take their defaults.
///
/// ```
/// # use delta_log_kernel::config::SnapshotManagerConfig;
/// let config = SnapshotManagerConfig::from_json(r#"{"checkpointSearchBatchSize": 100}"#).unwrap();
/// assert_eq!(config.checkpoint_search_batch_size, 100);
/// assert_eq!(config.log_dir_name, "_delta_log");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotManagerConfig {
    /// Name of the log directory under the table root.
    pub log_dir_name: String,
    /// Width, in versions, of each listing window of the backward checkpoint search.
    pub checkpoint_search_batch_size: u64,
    /// Whether compaction files are listed and included in segments.
    pub use_compacted_files: bool,
    /// Whether loading the latest version consults `_last_checkpoint`.
    pub read_last_checkpoint: bool,
}

impl Default for SnapshotManagerConfig {
    fn default() -> Self {
        Self {
            log_dir_name: DEFAULT_LOG_DIR_NAME.to_string(),
            checkpoint_search_batch_size: DEFAULT_CHECKPOINT_SEARCH_BATCH_SIZE,
            use_compacted_files: true,
            read_last_checkpoint: true,
        }
    }
}

impl SnapshotManagerConfig {
    pub fn from_json(json: &str) -> DeltaResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_log_dir_name(mut self, name: impl Into<String>) -> Self {
        self.log_dir_name = name.into();
        self
    }

    pub fn with_checkpoint_search_batch_size(mut self, size: u64) -> Self {
        self.checkpoint_search_batch_size = size;
        self
    }

    pub fn with_compacted_files(mut self, enabled: bool) -> Self {
        self.use_compacted_files = enabled;
        self
    }

    pub fn with_last_checkpoint(mut self, enabled: bool) -> Self {
        self.read_last_checkpoint = enabled;
        self
    }

    pub fn validate(&self) -> DeltaResult<()> {
        if self.checkpoint_search_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "checkpointSearchBatchSize must be positive".to_string(),
            ));
        }
        let name = self.log_dir_name.trim_matches('/');
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidConfig(format!(
                "logDirName must be a single path segment, got {:?}",
                self.log_dir_name
            )));
        }
        Ok(())
    }
}
