//! Checkpoint identity and discovery.
//!
//! A checkpoint is one or more part files sharing a version. It is only usable when every
//! declared part is present ("complete"). [`CheckpointInstance`] is the identity used to
//! group parts, order candidates and name the expected part files.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::debug;
use url::Url;

use crate::listing::list_log_files;
use crate::path::{
    checkpoint_filename, multi_part_checkpoint_filename, LogFileKind, LogPathFileType,
    ParsedLogPath,
};
use crate::storage::StorageHandler;
use crate::{DeltaResult, Version};

/// Identity of a checkpoint: its version and, for multi-part checkpoints, the part count.
///
/// Ordered by version, then by part count, so a fuller checkpoint at the same version sorts
/// after a smaller one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CheckpointInstance {
    pub version: Version,
    /// `None` for a single-file `{version}.checkpoint.parquet`.
    pub num_parts: Option<u32>,
}

impl CheckpointInstance {
    pub fn new(version: Version, num_parts: Option<u32>) -> Self {
        Self { version, num_parts }
    }

    pub fn from_path(path: &ParsedLogPath) -> Option<Self> {
        Self::with_part(path).map(|(instance, _)| instance)
    }

    /// Instance plus the 1-based part number of `path`.
    fn with_part(path: &ParsedLogPath) -> Option<(Self, u32)> {
        match path.file_type {
            LogPathFileType::SinglePartCheckpoint => Some((Self::new(path.version, None), 1)),
            LogPathFileType::MultiPartCheckpoint {
                part_num,
                num_parts,
            } => Some((Self::new(path.version, Some(num_parts)), part_num)),
            _ => None,
        }
    }

    /// Number of part files this checkpoint consists of.
    pub fn expected_parts(&self) -> usize {
        self.num_parts.unwrap_or(1) as usize
    }

    /// Whether this checkpoint may be used for a read bounded by `bound` (`None` = latest).
    pub fn is_not_later_than(&self, bound: Option<Version>) -> bool {
        bound.is_none_or(|bound| self.version <= bound)
    }

    /// Locations of every part file making up this checkpoint.
    pub fn corresponding_files(&self, log_root: &Url) -> DeltaResult<Vec<Url>> {
        let names = match self.num_parts {
            None => vec![checkpoint_filename(self.version)],
            Some(n) => (1..=n)
                .map(|part| multi_part_checkpoint_filename(self.version, part, n))
                .collect(),
        };
        Ok(names
            .iter()
            .map(|name| log_root.join(name))
            .collect::<Result<_, _>>()?)
    }
}

impl Ord for CheckpointInstance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.expected_parts().cmp(&other.expected_parts()))
            .then_with(|| self.num_parts.cmp(&other.num_parts))
    }
}

impl PartialOrd for CheckpointInstance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Newest complete checkpoint among `checkpoint_files` that is not later than `bound`.
///
/// Files that are not checkpoints are ignored. A checkpoint is complete when every part
/// `1..=num_parts` was listed.
pub fn latest_complete_checkpoint(
    checkpoint_files: &[ParsedLogPath],
    bound: Option<Version>,
) -> Option<CheckpointInstance> {
    let mut parts_by_instance: HashMap<CheckpointInstance, HashSet<u32>> = HashMap::new();
    for (instance, part) in checkpoint_files.iter().filter_map(CheckpointInstance::with_part) {
        if instance.is_not_later_than(bound) {
            parts_by_instance.entry(instance).or_default().insert(part);
        }
    }
    parts_by_instance
        .into_iter()
        .filter(|(instance, parts)| parts.len() == instance.expected_parts())
        .map(|(instance, _)| instance)
        .max()
}

/// Search backward from `bound` for the newest complete checkpoint with version <= `bound`.
///
/// The log is listed in windows of `batch_size` versions, newest window first, so a table
/// with a recent checkpoint costs a single listing.
pub fn find_last_complete_checkpoint_at_or_before(
    storage: &dyn StorageHandler,
    log_root: &Url,
    bound: Version,
    batch_size: u64,
) -> DeltaResult<Option<CheckpointInstance>> {
    let batch_size = batch_size.max(1);
    let mut upper_exclusive = bound.saturating_add(1);
    while upper_exclusive > 0 {
        let lower = upper_exclusive.saturating_sub(batch_size);
        let upper = upper_exclusive - 1;
        debug!("Searching {log_root} for a complete checkpoint in [{lower}, {upper}]");
        let checkpoints =
            list_log_files(storage, log_root, &[LogFileKind::Checkpoint], lower, Some(upper))?;
        if let Some(found) = latest_complete_checkpoint(&checkpoints, Some(upper)) {
            return Ok(Some(found));
        }
        upper_exclusive = lower;
    }
    Ok(None)
}
