//! A resolved, replayed view of a table at one version.

use url::Url;

use crate::actions::{Metadata, Protocol};
use crate::engine::SnapshotReport;
use crate::log_segment::LogSegment;
use crate::snapshot_hint::SnapshotHint;
use crate::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub(crate) table_root: Url,
    pub(crate) log_segment: LogSegment,
    pub(crate) protocol: Protocol,
    pub(crate) metadata: Metadata,
    pub(crate) report: SnapshotReport,
}

impl Snapshot {
    pub fn table_root(&self) -> &Url {
        &self.table_root
    }

    pub fn version(&self) -> Version {
        self.log_segment.end_version()
    }

    pub fn log_segment(&self) -> &LogSegment {
        &self.log_segment
    }

    pub fn checkpoint_version(&self) -> Option<Version> {
        self.log_segment.checkpoint_version()
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn report(&self) -> &SnapshotReport {
        &self.report
    }

    pub fn to_hint(&self) -> SnapshotHint {
        SnapshotHint::new(self.version(), self.protocol.clone(), self.metadata.clone())
    }
}
