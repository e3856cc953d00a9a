//! The validated set of log files describing one table version.

use url::Url;

use crate::path::ParsedLogPath;
use crate::{FileMeta, Version};

/// Files needed to reconstruct the table at `end_version`.
///
/// Only [`LogSegmentBuilder`](crate::log_segment_builder::LogSegmentBuilder) creates these,
/// and only after validation, so every instance satisfies:
///
/// - commit versions are contiguous and start right after the checkpoint (or at 0);
/// - the checkpoint, if any, has all of its parts;
/// - `end_version` is the last commit version, or the checkpoint version without commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSegment {
    pub(crate) log_root: Url,
    pub(crate) end_version: Version,
    pub(crate) ascending_commit_files: Vec<ParsedLogPath>,
    pub(crate) ascending_compaction_files: Vec<ParsedLogPath>,
    pub(crate) checkpoint_parts: Vec<ParsedLogPath>,
    pub(crate) latest_crc_file: Option<ParsedLogPath>,
    pub(crate) last_commit_timestamp: i64,
}

impl LogSegment {
    pub fn log_root(&self) -> &Url {
        &self.log_root
    }

    pub fn end_version(&self) -> Version {
        self.end_version
    }

    /// Listed and staged commits after the checkpoint, ascending.
    pub fn ascending_commit_files(&self) -> &[ParsedLogPath] {
        &self.ascending_commit_files
    }

    pub fn ascending_compaction_files(&self) -> &[ParsedLogPath] {
        &self.ascending_compaction_files
    }

    /// All part files of the checkpoint, empty when the segment starts at version 0.
    pub fn checkpoint_parts(&self) -> &[ParsedLogPath] {
        &self.checkpoint_parts
    }

    pub fn checkpoint_version(&self) -> Option<Version> {
        self.checkpoint_parts.first().map(|part| part.version)
    }

    pub fn has_checkpoint(&self) -> bool {
        !self.checkpoint_parts.is_empty()
    }

    /// Newest checksum file at or after the checkpoint version.
    pub fn latest_crc_file(&self) -> Option<&ParsedLogPath> {
        self.latest_crc_file.as_ref()
    }

    /// Modification time (ms since epoch) of the newest commit file found by listing.
    pub fn last_commit_timestamp(&self) -> i64 {
        self.last_commit_timestamp
    }

    pub fn commit_versions(&self) -> Vec<Version> {
        self.ascending_commit_files.iter().map(|c| c.version).collect()
    }

    /// Every file of the segment in replay order: commits newest first, then the checkpoint.
    pub fn files_for_replay(&self) -> impl Iterator<Item = &FileMeta> {
        self.ascending_commit_files
            .iter()
            .rev()
            .chain(self.checkpoint_parts.iter())
            .map(|path| &path.location)
    }
}
