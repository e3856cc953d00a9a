//! Error types for log segment resolution.

use thiserror::Error;

use crate::Version;

pub type DeltaResult<T, E = Error> = std::result::Result<T, E>;

/// All errors surfaced while resolving a table's log.
///
/// Errors raised by segment construction carry the table path plus the version that was
/// expected or missing, so a failure can be diagnosed without listing the log again.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Neither a checkpoint nor a commit file exists under the log directory.
    #[error("Table not found at {table_path}: {message}")]
    TableNotFound { table_path: String, message: String },

    /// The log exists but cannot produce a consistent segment.
    #[error("Invalid table at {table_path}: {message}")]
    InvalidTable { table_path: String, message: String },

    /// Commit versions have a gap. `version` is the first missing version.
    #[error("Invalid table at {table_path}: missing delta file for version {version}")]
    MissingDeltaFile { table_path: String, version: Version },

    /// A checkpoint was expected (from `_last_checkpoint` or a backward search) but the
    /// listing does not contain it.
    #[error("Invalid table at {table_path}: expected checkpoint at version {version} is missing")]
    MissingCheckpoint { table_path: String, version: Version },

    /// The authoritative checkpoint does not have all of its parts.
    #[error(
        "Invalid table at {table_path}: checkpoint at version {version} is corrupted, \
         expected {expected_parts} part(s) but found {found_parts}"
    )]
    CheckpointCorrupted {
        table_path: String,
        version: Version,
        expected_parts: usize,
        found_parts: usize,
    },

    /// A staged commit claims a version that the log directory already lists.
    #[error(
        "Invalid table at {table_path}: staged commit at version {version} collides with a \
         listed commit"
    )]
    StagedCommitConflict { table_path: String, version: Version },

    /// The requested version is newer than the latest committed version.
    #[error(
        "{table_path}: cannot load table version {requested} as it does not exist yet, \
         latest committed version is {latest}"
    )]
    VersionNotYetAvailable {
        table_path: String,
        requested: Version,
        latest: Version,
    },

    /// An internal invariant was broken. Not recoverable.
    #[error("{table_path}: internal invariant violated: {message}")]
    InternalInvariantViolation { table_path: String, message: String },

    /// Invalid argument supplied by a caller.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Opaque failure from a storage, replay or timestamp collaborator.
    #[error(transparent)]
    Storage(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),

    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    MalformedJson(#[from] serde_json::Error),

    #[error("Generic delta log kernel error: {0}")]
    Generic(String),
}

impl Error {
    pub fn generic(msg: impl ToString) -> Self {
        Self::Generic(msg.to_string())
    }

    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Storage(source.into())
    }

    pub fn table_not_found(table_path: impl ToString, message: impl ToString) -> Self {
        Self::TableNotFound {
            table_path: table_path.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_table(table_path: impl ToString, message: impl ToString) -> Self {
        Self::InvalidTable {
            table_path: table_path.to_string(),
            message: message.to_string(),
        }
    }

    pub fn missing_checkpoint(table_path: impl ToString, version: Version) -> Self {
        Self::MissingCheckpoint {
            table_path: table_path.to_string(),
            version,
        }
    }

    pub fn missing_delta_file(table_path: impl ToString, version: Version) -> Self {
        Self::MissingDeltaFile {
            table_path: table_path.to_string(),
            version,
        }
    }

    pub fn internal(table_path: impl ToString, message: impl ToString) -> Self {
        Self::InternalInvariantViolation {
            table_path: table_path.to_string(),
            message: message.to_string(),
        }
    }

    /// True for the `InvalidTable` family: the log on storage is inconsistent.
    pub fn is_invalid_table(&self) -> bool {
        matches!(
            self,
            Self::InvalidTable { .. }
                | Self::MissingDeltaFile { .. }
                | Self::MissingCheckpoint { .. }
                | Self::CheckpointCorrupted { .. }
                | Self::StagedCommitConflict { .. }
        )
    }

    /// True for errors that indicate a defect rather than a table or caller problem.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InternalInvariantViolation { .. })
    }
}
