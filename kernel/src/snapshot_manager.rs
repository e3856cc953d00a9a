//! Entry point for resolving snapshots of one table.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;
use url::Url;

use crate::config::SnapshotManagerConfig;
use crate::engine::{Engine, SnapshotReport};
use crate::log_segment::LogSegment;
use crate::log_segment_builder::LogSegmentBuilder;
use crate::snapshot::Snapshot;
use crate::snapshot_hint::{SnapshotHint, SnapshotHintCache};
use crate::staged::ParsedLogData;
use crate::storage::StorageHandler;
use crate::{DeltaResult, Version};

/// Resolves snapshots of a single table and remembers the newest one it has seen.
///
/// One manager is meant to live as long as the table handle and be shared across threads.
/// Every call lists the log on its own; the only state shared between calls is the
/// [`SnapshotHintCache`].
#[derive(Debug)]
pub struct SnapshotManager {
    builder: LogSegmentBuilder,
    latest_hint: SnapshotHintCache,
}

impl SnapshotManager {
    pub fn try_new(table_root: Url) -> DeltaResult<Self> {
        Self::try_new_with_config(table_root, SnapshotManagerConfig::default())
    }

    pub fn try_new_with_config(table_root: Url, config: SnapshotManagerConfig) -> DeltaResult<Self> {
        Ok(Self {
            builder: LogSegmentBuilder::try_new(table_root, &config)?,
            latest_hint: SnapshotHintCache::new(),
        })
    }

    pub fn table_root(&self) -> &Url {
        self.builder.table_root()
    }

    pub fn log_root(&self) -> &Url {
        self.builder.log_root()
    }

    /// The newest snapshot hint registered so far.
    pub fn latest_hint(&self) -> Option<Arc<SnapshotHint>> {
        self.latest_hint.current()
    }

    /// Construct the latest snapshot of the table.
    ///
    /// Fails with [`TableNotFound`](crate::Error::TableNotFound) when the log is empty and
    /// with an invalid-table error when the log is inconsistent.
    pub fn build_latest_snapshot(&self, engine: &dyn Engine) -> DeltaResult<Snapshot> {
        self.build_snapshot(engine, None, &[], None)
    }

    /// Construct the snapshot at exactly `version`.
    ///
    /// Fails with [`VersionNotYetAvailable`](crate::Error::VersionNotYetAvailable) when the
    /// table has not reached `version`.
    pub fn snapshot_at(&self, engine: &dyn Engine, version: Version) -> DeltaResult<Snapshot> {
        self.build_snapshot(engine, Some(version), &[], None)
    }

    /// Construct the snapshot that was current at `timestamp_millis` (ms since the epoch).
    pub fn snapshot_at_timestamp(
        &self,
        engine: &dyn Engine,
        timestamp_millis: i64,
    ) -> DeltaResult<Snapshot> {
        let start = Instant::now();
        let version = engine
            .timestamp_resolver()
            .version_at_timestamp(self.log_root(), timestamp_millis)?;
        let elapsed = start.elapsed();
        info!(
            "{}: Took {} ms to fetch version at timestamp {timestamp_millis}",
            self.table_root(),
            elapsed.as_millis()
        );
        self.build_snapshot(engine, Some(version), &[], Some(elapsed))
    }

    /// Construct a snapshot of a coordinated table, merging in the commits its coordinator
    /// has ratified but not yet published. `version` of `None` loads the latest version.
    pub fn snapshot_with_staged_commits(
        &self,
        engine: &dyn Engine,
        version: Option<Version>,
        staged_commits: &[ParsedLogData],
    ) -> DeltaResult<Snapshot> {
        self.build_snapshot(engine, version, staged_commits, None)
    }

    /// Resolve only the [`LogSegment`] for `version` (`None` = latest), without replaying it.
    pub fn log_segment_for_version(
        &self,
        storage: &dyn StorageHandler,
        version: Option<Version>,
        staged_commits: &[ParsedLogData],
    ) -> DeltaResult<LogSegment> {
        self.builder.build(storage, version, staged_commits)
    }

    fn build_snapshot(
        &self,
        engine: &dyn Engine,
        version: Option<Version>,
        staged_commits: &[ParsedLogData],
        timestamp_to_version_duration: Option<Duration>,
    ) -> DeltaResult<Snapshot> {
        let start = Instant::now();
        let storage = engine.storage_handler();
        let segment = self.log_segment_for_version(storage.as_ref(), version, staged_commits)?;
        let load_log_segment_duration = start.elapsed();
        self.create_snapshot(
            engine,
            segment,
            timestamp_to_version_duration,
            load_log_segment_duration,
        )
    }

    fn create_snapshot(
        &self,
        engine: &dyn Engine,
        segment: LogSegment,
        timestamp_to_version_duration: Option<Duration>,
        load_log_segment_duration: Duration,
    ) -> DeltaResult<Snapshot> {
        let table_path = self.table_root().as_str();
        let starting_from = match segment.checkpoint_version() {
            Some(v) => format!(" starting from checkpoint version {v}."),
            None => ".".to_string(),
        };
        info!(
            "{table_path}: Loading version {}{starting_from}",
            segment.end_version()
        );

        let start = Instant::now();
        let hint = self.latest_hint.current();
        let replayed = engine
            .log_replayer()
            .replay(&segment, hint.as_deref())?;
        let load_protocol_and_metadata_duration = start.elapsed();

        let report = SnapshotReport {
            table_path: table_path.to_string(),
            version: segment.end_version(),
            checkpoint_version: segment.checkpoint_version(),
            timestamp_to_version_duration,
            load_log_segment_duration,
            load_protocol_and_metadata_duration,
        };
        let snapshot = Snapshot {
            table_root: self.table_root().clone(),
            log_segment: segment,
            protocol: replayed.protocol,
            metadata: replayed.metadata,
            report,
        };

        for reporter in engine.metrics_reporters() {
            reporter.report(snapshot.report());
        }

        info!(
            "{table_path}: Took {}ms to construct the snapshot (loading protocol and metadata) for {}{starting_from}",
            load_protocol_and_metadata_duration.as_millis(),
            snapshot.version()
        );

        self.latest_hint.register(snapshot.to_hint());
        Ok(snapshot)
    }
}
