//! Log segment resolution for Delta tables.
//!
//! A Delta table's state at a version is defined by its `_delta_log` directory: an optional
//! checkpoint plus the commit files written after it. This crate works out *which* files make
//! up that state, validates that they form a contiguous history, and caches the newest
//! snapshot it resolved so later reads can build on it.
//!
//! The entry point is [`SnapshotManager`]. Storage access and log replay are supplied through
//! an [`Engine`](engine::Engine), so the crate itself never decodes parquet or JSON actions.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use delta_log_kernel::{DeltaResult, SnapshotManager};
//! # use delta_log_kernel::storage::ObjectStoreStorage;
//! # fn run() -> DeltaResult<()> {
//! let store = Arc::new(object_store::memory::InMemory::new());
//! let storage = ObjectStoreStorage::new(store);
//! let manager = SnapshotManager::try_new(url::Url::parse("memory:///my_table/")?)?;
//! let segment = manager.log_segment_for_version(&storage, None, &[])?;
//! println!("latest version: {}", segment.end_version());
//! # Ok(())
//! # }
//! ```

use url::Url;

pub mod actions;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod last_checkpoint_hint;
pub mod listing;
pub mod log_segment;
pub mod log_segment_builder;
pub mod path;
pub mod snapshot;
pub mod snapshot_hint;
pub mod snapshot_manager;
pub mod staged;
pub mod storage;

pub use error::{DeltaResult, Error};
pub use log_segment::LogSegment;
pub use path::{LogFileKind, ParsedLogPath};
pub use snapshot::Snapshot;
pub use snapshot_hint::SnapshotHint;
pub use snapshot_manager::SnapshotManager;

/// Delta table version, starting at 0 and incremented by one with every commit.
pub type Version = u64;

/// The metadata that describes an object in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileMeta {
    /// The fully qualified path to the object
    pub location: Url,
    /// The last modified time as milliseconds since unix epoch
    pub last_modified: i64,
    /// The size in bytes of the object
    pub size: u64,
}

impl FileMeta {
    pub fn new(location: Url, last_modified: i64, size: u64) -> Self {
        Self {
            location,
            last_modified,
            size,
        }
    }
}
