//! Collaborators the resolver delegates to.
//!
//! An [`Engine`] bundles storage access, log replay, timestamp resolution and metrics
//! reporting, so a [`SnapshotManager`](crate::snapshot_manager::SnapshotManager) can be
//! driven against any storage or execution backend.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::actions::{Metadata, Protocol};
use crate::log_segment::LogSegment;
use crate::snapshot_hint::SnapshotHint;
use crate::storage::StorageHandler;
use crate::{DeltaResult, Version};

/// Result of folding a log segment into table state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutput {
    pub protocol: Protocol,
    pub metadata: Metadata,
}

/// Folds the actions of a [`LogSegment`] into protocol and metadata.
pub trait LogReplayer: Send + Sync {
    /// `hint` is the newest snapshot resolved so far for the table, if any. Implementations
    /// may reuse it when `hint.version <= segment.end_version()`; they must not require it.
    fn replay(&self, segment: &LogSegment, hint: Option<&SnapshotHint>)
        -> DeltaResult<ReplayOutput>;
}

/// Maps a timestamp to the version that was current at that time.
pub trait TimestampResolver: Send + Sync {
    fn version_at_timestamp(&self, log_root: &Url, timestamp_millis: i64) -> DeltaResult<Version>;
}

/// Metrics describing how one snapshot was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReport {
    pub table_path: String,
    pub version: Version,
    pub checkpoint_version: Option<Version>,
    pub timestamp_to_version_duration: Option<Duration>,
    pub load_log_segment_duration: Duration,
    pub load_protocol_and_metadata_duration: Duration,
}

pub trait MetricsReporter: Send + Sync {
    fn report(&self, report: &SnapshotReport);
}

pub trait Engine: Send + Sync {
    fn storage_handler(&self) -> Arc<dyn StorageHandler>;

    fn log_replayer(&self) -> Arc<dyn LogReplayer>;

    fn timestamp_resolver(&self) -> Arc<dyn TimestampResolver>;

    fn metrics_reporters(&self) -> Vec<Arc<dyn MetricsReporter>> {
        Vec::new()
    }
}

/// An [`Engine`] assembled from individual collaborators.
#[derive(Clone)]
pub struct DefaultEngine {
    storage: Arc<dyn StorageHandler>,
    replayer: Arc<dyn LogReplayer>,
    timestamp_resolver: Arc<dyn TimestampResolver>,
    reporters: Vec<Arc<dyn MetricsReporter>>,
}

impl DefaultEngine {
    pub fn new(
        storage: Arc<dyn StorageHandler>,
        replayer: Arc<dyn LogReplayer>,
        timestamp_resolver: Arc<dyn TimestampResolver>,
    ) -> Self {
        Self {
            storage,
            replayer,
            timestamp_resolver,
            reporters: Vec::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn MetricsReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }
}

impl Engine for DefaultEngine {
    fn storage_handler(&self) -> Arc<dyn StorageHandler> {
        self.storage.clone()
    }

    fn log_replayer(&self) -> Arc<dyn LogReplayer> {
        self.replayer.clone()
    }

    fn timestamp_resolver(&self) -> Arc<dyn TimestampResolver> {
        self.timestamp_resolver.clone()
    }

    fn metrics_reporters(&self) -> Vec<Arc<dyn MetricsReporter>> {
        self.reporters.clone()
    }
}
