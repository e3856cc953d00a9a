//! Classification of `_delta_log` file names.
//!
//! Every file the resolver cares about has a name of the form `{version:020}.{suffix}`:
//!
//! ```text
//! 00000000000000000010.json                                   commit
//! 00000000000000000010.checkpoint.parquet                     single-part checkpoint
//! 00000000000000000010.checkpoint.0000000001.0000000003.parquet  part 1 of 3
//! 00000000000000000004.00000000000000000009.compacted.json    compaction of 4..=9
//! 00000000000000000010.crc                                    checksum
//! ```
//!
//! Anything else (including `_last_checkpoint` and temporary files) is not a log file.

use std::fmt;

use url::Url;

use crate::{FileMeta, Version};

const VERSION_WIDTH: usize = 20;
const PART_WIDTH: usize = 10;

/// Fine-grained type of a log file, carrying the information encoded in its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogPathFileType {
    Commit,
    SinglePartCheckpoint,
    MultiPartCheckpoint { part_num: u32, num_parts: u32 },
    /// Compaction covering `[version, hi]`.
    CompactedCommit { hi: Version },
    Crc,
}

/// The four kinds of log file the resolver lists and partitions by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogFileKind {
    Commit,
    Checkpoint,
    Compaction,
    Checksum,
}

impl LogFileKind {
    pub const ALL: [LogFileKind; 4] = [
        LogFileKind::Commit,
        LogFileKind::Checkpoint,
        LogFileKind::Compaction,
        LogFileKind::Checksum,
    ];
}

impl fmt::Display for LogFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFileKind::Commit => "commit",
            LogFileKind::Checkpoint => "checkpoint",
            LogFileKind::Compaction => "compaction",
            LogFileKind::Checksum => "checksum",
        };
        f.write_str(name)
    }
}

impl LogPathFileType {
    /// Parse a bare file name into its version and type. Returns `None` for names outside
    /// the log file grammar.
    pub fn classify(filename: &str) -> Option<(Version, LogPathFileType)> {
        let (version_str, suffix) = filename.split_once('.')?;
        let version = parse_fixed_width(version_str, VERSION_WIDTH)?;

        let parts: Vec<&str> = suffix.split('.').collect();
        let file_type = match parts.as_slice() {
            ["json"] => LogPathFileType::Commit,
            ["crc"] => LogPathFileType::Crc,
            ["checkpoint", "parquet"] => LogPathFileType::SinglePartCheckpoint,
            ["checkpoint", part_num, num_parts, "parquet"] => {
                let part_num = parse_fixed_width(part_num, PART_WIDTH)?;
                let num_parts = parse_fixed_width(num_parts, PART_WIDTH)?;
                if part_num == 0 || part_num > num_parts {
                    return None;
                }
                LogPathFileType::MultiPartCheckpoint {
                    part_num: u32::try_from(part_num).ok()?,
                    num_parts: u32::try_from(num_parts).ok()?,
                }
            }
            [hi, "compacted", "json"] => {
                let hi = parse_fixed_width(hi, VERSION_WIDTH)?;
                if hi < version {
                    return None;
                }
                LogPathFileType::CompactedCommit { hi }
            }
            _ => return None,
        };
        Some((version, file_type))
    }

    pub fn kind(&self) -> LogFileKind {
        match self {
            LogPathFileType::Commit => LogFileKind::Commit,
            LogPathFileType::SinglePartCheckpoint | LogPathFileType::MultiPartCheckpoint { .. } => {
                LogFileKind::Checkpoint
            }
            LogPathFileType::CompactedCommit { .. } => LogFileKind::Compaction,
            LogPathFileType::Crc => LogFileKind::Checksum,
        }
    }
}

fn parse_fixed_width(s: &str, width: usize) -> Option<u64> {
    if s.len() != width || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// A listed file whose name has been classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLogPath {
    pub location: FileMeta,
    pub filename: String,
    pub version: Version,
    pub file_type: LogPathFileType,
}

impl ParsedLogPath {
    /// Classify a listed file. `None` if the file is not part of the log grammar.
    pub fn parse(location: FileMeta) -> Option<Self> {
        let filename = location
            .location
            .path_segments()
            .and_then(|mut segments| segments.next_back())?
            .to_string();
        let (version, file_type) = LogPathFileType::classify(&filename)?;
        Some(Self {
            location,
            filename,
            version,
            file_type,
        })
    }

    pub fn kind(&self) -> LogFileKind {
        self.file_type.kind()
    }

    /// Inclusive version range covered by a compaction file.
    pub fn compaction_range(&self) -> Option<(Version, Version)> {
        match self.file_type {
            LogPathFileType::CompactedCommit { hi } => Some((self.version, hi)),
            _ => None,
        }
    }
}

pub fn commit_filename(version: Version) -> String {
    format!("{version:020}.json")
}

pub fn checkpoint_filename(version: Version) -> String {
    format!("{version:020}.checkpoint.parquet")
}

pub fn multi_part_checkpoint_filename(version: Version, part_num: u32, num_parts: u32) -> String {
    format!("{version:020}.checkpoint.{part_num:010}.{num_parts:010}.parquet")
}

pub fn compaction_filename(lo: Version, hi: Version) -> String {
    format!("{lo:020}.{hi:020}.compacted.json")
}

pub fn checksum_filename(version: Version) -> String {
    format!("{version:020}.crc")
}

/// Location to start a listing from so that every log file with version >= `version` sorts
/// at or after it.
pub(crate) fn listing_prefix(log_root: &Url, version: Version) -> Result<Url, url::ParseError> {
    log_root.join(&format!("{version:020}"))
}
