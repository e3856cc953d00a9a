//! Commits ratified by a commit coordinator but not yet published to the log directory.
//!
//! Coordinated tables write each commit to `_delta_log/_staged_commits/{version:020}.{uuid}.json`
//! first. Once the coordinator ratifies it the commit is part of the table, even though no
//! `{version:020}.json` exists yet. The coordinator hands these to the resolver as a list of
//! [`ParsedLogData`].

use std::fmt;

use bytes::Bytes;
use uuid::Uuid;

use crate::path::{LogPathFileType, ParsedLogPath};
use crate::{DeltaResult, Error, FileMeta, Version};

pub const STAGED_COMMITS_DIR_NAME: &str = "_staged_commits";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedLogType {
    RatifiedStagedCommit,
}

/// Where the content of a staged commit lives.
#[derive(Clone, PartialEq, Eq)]
pub enum LogDataSource {
    /// Backed by a readable file.
    Materialized(FileMeta),
    /// Only known to the coordinator, held in memory.
    Inline(Bytes),
}

impl fmt::Debug for LogDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogDataSource::Materialized(meta) => {
                f.debug_tuple("Materialized").field(&meta.location.as_str()).finish()
            }
            LogDataSource::Inline(data) => write!(f, "Inline({} bytes)", data.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLogData {
    pub version: Version,
    pub log_type: ParsedLogType,
    pub source: LogDataSource,
}

impl ParsedLogData {
    /// Build from a staged commit file, parsing the version from its name.
    pub fn for_staged_commit(file: FileMeta) -> DeltaResult<Self> {
        let version = parse_staged_commit_location(&file).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "{} is not a staged commit file",
                file.location
            ))
        })?;
        Ok(Self {
            version,
            log_type: ParsedLogType::RatifiedStagedCommit,
            source: LogDataSource::Materialized(file),
        })
    }

    pub fn for_inline_commit(version: Version, data: Bytes) -> Self {
        Self {
            version,
            log_type: ParsedLogType::RatifiedStagedCommit,
            source: LogDataSource::Inline(data),
        }
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self.source, LogDataSource::Materialized(_))
    }

    pub fn file_meta(&self) -> Option<&FileMeta> {
        match &self.source {
            LogDataSource::Materialized(meta) => Some(meta),
            LogDataSource::Inline(_) => None,
        }
    }

    /// View a materialized staged commit as a commit file of the segment.
    pub fn as_commit_path(&self) -> Option<ParsedLogPath> {
        let meta = self.file_meta()?;
        let filename = meta
            .location
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();
        Some(ParsedLogPath {
            location: meta.clone(),
            filename,
            version: self.version,
            file_type: LogPathFileType::Commit,
        })
    }
}

fn parse_staged_commit_location(file: &FileMeta) -> Option<Version> {
    let mut segments = file.location.path_segments()?.rev();
    let filename = segments.next()?;
    if segments.next()? != STAGED_COMMITS_DIR_NAME {
        return None;
    }
    let (version, rest) = filename.split_once('.')?;
    let (uuid, extension) = rest.split_once('.')?;
    if version.len() != 20 || !version.bytes().all(|b| b.is_ascii_digit()) || extension != "json"
    {
        return None;
    }
    Uuid::parse_str(uuid).ok()?;
    version.parse().ok()
}

/// Staged commits must arrive strictly ordered by version.
pub(crate) fn validate_staged_commits(staged: &[ParsedLogData]) -> DeltaResult<()> {
    for pair in staged.windows(2) {
        if pair[1].version <= pair[0].version {
            return Err(Error::InvalidArgument(format!(
                "staged commits must be sorted and unique by version, found {} after {}",
                pair[1].version, pair[0].version
            )));
        }
    }
    Ok(())
}
