//! Version-bounded listing of the log directory.

use url::Url;

use crate::path::{listing_prefix, LogFileKind, ParsedLogPath};
use crate::storage::StorageHandler;
use crate::{DeltaResult, Version};

/// List the log files of the requested kinds with `start_version <= version <= end_version`.
///
/// Files are returned in listing order: ascending by version, lexicographic within a version.
/// The storage listing itself is bounded by `end_version`, so a narrow window only reads the
/// files inside it.
pub fn list_log_files(
    storage: &dyn StorageHandler,
    log_root: &Url,
    kinds: &[LogFileKind],
    start_version: Version,
    end_version: Option<Version>,
) -> DeltaResult<Vec<ParsedLogPath>> {
    let start = listing_prefix(log_root, start_version)?;
    // every file of version v sorts before the bare prefix of v + 1
    let end_before = end_version
        .and_then(|end| end.checked_add(1))
        .map(|next| listing_prefix(log_root, next))
        .transpose()?;
    let mut files = Vec::new();
    for meta in storage.list_from(&start, end_before.as_ref())? {
        let Some(path) = ParsedLogPath::parse(meta) else {
            continue;
        };
        if path.version < start_version {
            continue;
        }
        if end_version.is_some_and(|end| path.version > end) {
            break;
        }
        if kinds.contains(&path.kind()) {
            files.push(path);
        }
    }
    Ok(files)
}
