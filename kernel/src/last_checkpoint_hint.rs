//! The `_last_checkpoint` pointer file.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::storage::StorageHandler;
use crate::{DeltaResult, Version};

pub const LAST_CHECKPOINT_FILE_NAME: &str = "_last_checkpoint";

/// Contents of `_last_checkpoint`.
///
/// Advisory only: the checkpoint it names must still be confirmed by a listing of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCheckpointHint {
    /// The version of the table when the last checkpoint was made.
    pub version: Version,
    /// The number of actions stored in the checkpoint.
    #[serde(default)]
    pub size: i64,
    /// The number of fragments if the last checkpoint was written in multiple parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<usize>,
    /// The number of bytes of the checkpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<i64>,
    /// The number of AddFile actions in the checkpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_of_add_files: Option<i64>,
}

impl LastCheckpointHint {
    /// Read `_last_checkpoint` under `log_root`.
    ///
    /// A missing file is `Ok(None)`. So is a file that cannot be parsed: the pointer only
    /// short-circuits the checkpoint search, so an unreadable one is logged and ignored.
    /// Storage failures other than not-found propagate.
    pub fn try_read(
        storage: &dyn StorageHandler,
        log_root: &Url,
    ) -> DeltaResult<Option<LastCheckpointHint>> {
        let location = log_root.join(LAST_CHECKPOINT_FILE_NAME)?;
        let Some(data) = storage.read(&location)? else {
            debug!("No {LAST_CHECKPOINT_FILE_NAME} file found in {log_root}");
            return Ok(None);
        };
        match Self::parse(&data) {
            Some(hint) => Ok(Some(hint)),
            None => {
                warn!("{location}: failed to parse {LAST_CHECKPOINT_FILE_NAME}, ignoring it");
                Ok(None)
            }
        }
    }

    /// Parse the first non-empty line of the file.
    pub fn parse(data: &[u8]) -> Option<LastCheckpointHint> {
        let text = std::str::from_utf8(data).ok()?;
        let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
        serde_json::from_str(line).ok()
    }
}
