//! Cross-request cache of the newest resolved snapshot.

use std::sync::{Arc, RwLock};

use crate::actions::{Metadata, Protocol};
use crate::Version;

/// Version, protocol and metadata of a previously resolved snapshot.
///
/// Log replay may start from a hint instead of the checkpoint when the hint is recent enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHint {
    pub version: Version,
    pub protocol: Protocol,
    pub metadata: Metadata,
}

impl SnapshotHint {
    pub fn new(version: Version, protocol: Protocol, metadata: Metadata) -> Self {
        Self {
            version,
            protocol,
            metadata,
        }
    }
}

/// Holds the hint with the greatest version registered so far.
///
/// Registration is a compare-then-set under a write lock: a candidate replaces the cached hint
/// only when its version is strictly greater, so the cached version never moves backwards and
/// no higher registration is lost, whatever the interleaving.
#[derive(Debug, Default)]
pub struct SnapshotHintCache {
    latest: RwLock<Option<Arc<SnapshotHint>>>,
}

impl SnapshotHintCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<SnapshotHint>> {
        // The guarded value is replaced wholesale, a poisoned lock still holds a valid hint.
        let guard = self.latest.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    pub fn current_version(&self) -> Option<Version> {
        self.current().map(|hint| hint.version)
    }

    /// Cache `candidate` if it is newer than the cached hint. Returns whether it was cached.
    pub fn register(&self, candidate: SnapshotHint) -> bool {
        let mut guard = self.latest.write().unwrap_or_else(|e| e.into_inner());
        let newer = guard
            .as_ref()
            .is_none_or(|current| candidate.version > current.version);
        if newer {
            *guard = Some(Arc::new(candidate));
        }
        newer
    }
}
