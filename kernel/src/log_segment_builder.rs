//! Builds a [`LogSegment`] from a listing of the log directory.
//!
//! [`LogSegmentBuilder::build`] runs the pipeline below. Every step after the listing is a
//! plain function over explicit lists so it can be exercised on synthetic listings.
//!
//! 1. Find the starting checkpoint: `_last_checkpoint` for "latest", or a backward search for
//!    an explicit version.
//! 2. List commits, checkpoints, checksums (and compactions) once, from that checkpoint
//!    through the requested version.
//! 3. Empty listing: missing checkpoint if one was expected, otherwise table not found.
//! 4. [`partition_listing`] by file kind.
//! 5. [`latest_complete_checkpoint`] among the listed checkpoints.
//! 6. [`select_commits`] after the checkpoint.
//! 7. [`select_staged_commits`] after the last listed commit, appended at the end.
//! 8. [`select_compactions`] after the checkpoint.
//! 9. and 10. [`validate_segment`] computes and validates the resolved version.
//! 11. [`collect_checkpoint_parts`] for the chosen checkpoint.
//! 12. [`latest_checksum`].
//! 13. Assemble the segment.

use std::collections::HashSet;
use std::time::Instant;

use itertools::Itertools;
use tracing::{debug, info, warn, Level};
use url::Url;

use crate::checkpoint::{
    find_last_complete_checkpoint_at_or_before, latest_complete_checkpoint, CheckpointInstance,
};
use crate::config::SnapshotManagerConfig;
use crate::last_checkpoint_hint::LastCheckpointHint;
use crate::listing::list_log_files;
use crate::log_segment::LogSegment;
use crate::path::{LogFileKind, ParsedLogPath};
use crate::staged::{validate_staged_commits, ParsedLogData};
use crate::storage::StorageHandler;
use crate::{DeltaResult, Error, Version};

/// Listed files split by kind, each list in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionedLogFiles {
    pub commits: Vec<ParsedLogPath>,
    pub checkpoints: Vec<ParsedLogPath>,
    pub compactions: Vec<ParsedLogPath>,
    pub checksums: Vec<ParsedLogPath>,
}

impl PartitionedLogFiles {
    fn log_debug(&self) {
        debug_files("listedCommitFiles", &self.commits);
        debug_files("listedCheckpointFiles", &self.checkpoints);
        debug_files("listedCompactionFiles", &self.compactions);
        debug_files("listedChecksumFiles", &self.checksums);
    }
}

fn debug_files(name: &str, files: &[ParsedLogPath]) {
    if tracing::enabled!(Level::DEBUG) {
        let names = files.iter().map(|f| f.filename.as_str()).join(", ");
        debug!("{name}: [{names}]");
    }
}

fn within(version: Version, end_version: Option<Version>) -> bool {
    end_version.is_none_or(|end| version <= end)
}

fn after(version: Version, lower_exclusive: Option<Version>) -> bool {
    lower_exclusive.is_none_or(|lower| version > lower)
}

pub fn partition_listing(files: Vec<ParsedLogPath>) -> PartitionedLogFiles {
    let mut partitioned = PartitionedLogFiles::default();
    for file in files {
        match file.kind() {
            LogFileKind::Commit => partitioned.commits.push(file),
            LogFileKind::Checkpoint => partitioned.checkpoints.push(file),
            LogFileKind::Compaction => partitioned.compactions.push(file),
            LogFileKind::Checksum => partitioned.checksums.push(file),
        }
    }
    partitioned
}

/// Listed commits with `checkpoint_version < version <= end_version`.
pub fn select_commits(
    commits: &[ParsedLogPath],
    checkpoint_version: Option<Version>,
    end_version: Option<Version>,
) -> Vec<ParsedLogPath> {
    commits
        .iter()
        .filter(|c| after(c.version, checkpoint_version) && within(c.version, end_version))
        .cloned()
        .collect()
}

/// Materialized staged commits with `lower_exclusive < version <= end_version`, in order.
///
/// `lower_exclusive` is the last selected listed commit, or the checkpoint version when no
/// commit was listed after it. A materialized staged commit above the checkpoint that claims
/// the version of a listed commit is a conflict.
pub fn select_staged_commits(
    table_path: &str,
    staged: &[ParsedLogData],
    listed_commits: &[ParsedLogPath],
    checkpoint_version: Option<Version>,
    end_version: Option<Version>,
) -> DeltaResult<Vec<ParsedLogPath>> {
    let listed_versions: HashSet<Version> = listed_commits.iter().map(|c| c.version).collect();
    let lower_exclusive = listed_commits
        .last()
        .map(|c| c.version)
        .or(checkpoint_version);

    let mut selected = Vec::new();
    for data in staged.iter().filter(|d| d.is_materialized()) {
        if !after(data.version, checkpoint_version) || !within(data.version, end_version) {
            continue;
        }
        if listed_versions.contains(&data.version) {
            return Err(Error::StagedCommitConflict {
                table_path: table_path.to_string(),
                version: data.version,
            });
        }
        if after(data.version, lower_exclusive) {
            selected.extend(data.as_commit_path());
        }
    }
    Ok(selected)
}

/// Compactions whose whole range lies in `(checkpoint_version, end_version]`.
pub fn select_compactions(
    compactions: &[ParsedLogPath],
    checkpoint_version: Option<Version>,
    end_version: Option<Version>,
) -> Vec<ParsedLogPath> {
    compactions
        .iter()
        .filter(|c| match c.compaction_range() {
            Some((lo, hi)) => after(lo, checkpoint_version) && within(hi, end_version),
            None => false,
        })
        .cloned()
        .collect()
}

/// Validate the selected files and return the resolved version.
///
/// `listed_commits` is every commit in the listing (the checkpoint's own commit is among
/// them), `commits` the selected listed plus staged commits.
pub fn validate_segment(
    table_path: &str,
    listed_commits: &[ParsedLogPath],
    checkpoint: Option<&CheckpointInstance>,
    commits: &[ParsedLogPath],
    end_version: Option<Version>,
) -> DeltaResult<Version> {
    let checkpoint_version = checkpoint.map(|cp| cp.version);
    let Some(new_version) = commits.last().map(|c| c.version).or(checkpoint_version) else {
        return Err(Error::invalid_table(
            table_path,
            "No complete checkpoint found and no delta files found",
        ));
    };

    if let Some(cp_version) = checkpoint_version {
        if !listed_commits.iter().any(|c| c.version == cp_version) {
            return Err(Error::missing_delta_file(table_path, cp_version));
        }
    }

    if let Some(requested) = end_version {
        if new_version < requested {
            return Err(Error::VersionNotYetAvailable {
                table_path: table_path.to_string(),
                requested,
                latest: new_version,
            });
        }
        if new_version > requested {
            return Err(Error::internal(
                table_path,
                format!("expected to load version {requested} but actually loaded {new_version}"),
            ));
        }
    }

    if let Some(first) = commits.first() {
        let expected_first = checkpoint_version.map_or(0, |v| v + 1);
        if first.version != expected_first {
            return Err(Error::missing_delta_file(table_path, expected_first));
        }
        for pair in commits.windows(2) {
            let (prev, next) = (pair[0].version, pair[1].version);
            if next <= prev {
                return Err(Error::invalid_table(
                    table_path,
                    format!("delta versions are not strictly increasing: {prev} then {next}"),
                ));
            }
            if next != prev + 1 {
                return Err(Error::missing_delta_file(table_path, prev + 1));
            }
        }
        debug!("Verified delta files are contiguous from version {expected_first} to {new_version}");
    }

    Ok(new_version)
}

/// All part files of `checkpoint` among the listed checkpoint files.
pub fn collect_checkpoint_parts(
    table_path: &str,
    log_root: &Url,
    checkpoint: &CheckpointInstance,
    checkpoint_files: &[ParsedLogPath],
) -> DeltaResult<Vec<ParsedLogPath>> {
    let expected: HashSet<Url> = checkpoint.corresponding_files(log_root)?.into_iter().collect();
    let mut seen = HashSet::new();
    let parts: Vec<ParsedLogPath> = checkpoint_files
        .iter()
        .filter(|f| expected.contains(&f.location.location) && seen.insert(&f.location.location))
        .cloned()
        .collect();
    debug_files("checkpointParts", &parts);

    if parts.len() != expected.len() {
        return Err(Error::CheckpointCorrupted {
            table_path: table_path.to_string(),
            version: checkpoint.version,
            expected_parts: expected.len(),
            found_parts: parts.len(),
        });
    }
    Ok(parts)
}

/// The last listed checksum, if it is not older than the checkpoint.
pub fn latest_checksum(
    checksums: &[ParsedLogPath],
    checkpoint_version: Option<Version>,
) -> Option<ParsedLogPath> {
    checksums
        .last()
        .filter(|crc| checkpoint_version.is_none_or(|cp| crc.version >= cp))
        .cloned()
}

/// Resolves log segments for one table.
#[derive(Debug, Clone)]
pub struct LogSegmentBuilder {
    table_root: Url,
    log_root: Url,
    checkpoint_search_batch_size: u64,
    use_compacted_files: bool,
    read_last_checkpoint: bool,
}

impl LogSegmentBuilder {
    pub fn try_new(table_root: Url, config: &SnapshotManagerConfig) -> DeltaResult<Self> {
        config.validate()?;
        let table_root = ensure_trailing_slash(table_root);
        let log_root = table_root.join(&format!("{}/", config.log_dir_name.trim_matches('/')))?;
        Ok(Self {
            table_root,
            log_root,
            checkpoint_search_batch_size: config.checkpoint_search_batch_size,
            use_compacted_files: config.use_compacted_files,
            read_last_checkpoint: config.read_last_checkpoint,
        })
    }

    pub fn table_root(&self) -> &Url {
        &self.table_root
    }

    pub fn log_root(&self) -> &Url {
        &self.log_root
    }

    fn listed_kinds(&self) -> Vec<LogFileKind> {
        LogFileKind::ALL
            .into_iter()
            .filter(|kind| self.use_compacted_files || *kind != LogFileKind::Compaction)
            .collect()
    }

    /// Checkpoint version to start listing from.
    fn start_checkpoint_version(
        &self,
        storage: &dyn StorageHandler,
        end_version: Option<Version>,
    ) -> DeltaResult<Option<Version>> {
        let table_path = self.table_root.as_str();
        match end_version {
            Some(end_version) => {
                info!("Finding last complete checkpoint at or before version {end_version}");
                let start = Instant::now();
                let found = find_last_complete_checkpoint_at_or_before(
                    storage,
                    &self.log_root,
                    end_version,
                    self.checkpoint_search_batch_size,
                )?;
                let Some(checkpoint) = found else {
                    return Ok(None);
                };
                if checkpoint.version > end_version {
                    return Err(Error::internal(
                        table_path,
                        format!(
                            "last complete checkpoint version {} was not <= target version {end_version}",
                            checkpoint.version
                        ),
                    ));
                }
                info!(
                    "{table_path}: Took {}ms to find last complete checkpoint <= targetVersion {end_version}",
                    start.elapsed().as_millis()
                );
                Ok(Some(checkpoint.version))
            }
            None if self.read_last_checkpoint => {
                Ok(LastCheckpointHint::try_read(storage, &self.log_root)?.map(|hint| hint.version))
            }
            None => Ok(None),
        }
    }

    /// Resolve the segment for `end_version` (`None` for the latest version), merging in
    /// `staged_commits` reported by the table's commit coordinator.
    pub fn build(
        &self,
        storage: &dyn StorageHandler,
        end_version: Option<Version>,
        staged_commits: &[ParsedLogData],
    ) -> DeltaResult<LogSegment> {
        let table_path = self.table_root.as_str();
        let build_start = Instant::now();
        match end_version {
            Some(v) => info!("Loading log segment for version {v}"),
            None => info!("Loading log segment for version latest"),
        }
        validate_staged_commits(staged_commits)?;

        let start_checkpoint = self.start_checkpoint_version(storage, end_version)?;
        let list_from = match start_checkpoint {
            Some(version) => {
                info!("Found a complete checkpoint at version {version}.");
                version
            }
            None => {
                warn!("Cannot find a complete checkpoint. Listing from version 0.");
                0
            }
        };

        let listing_start = Instant::now();
        let listed = list_log_files(
            storage,
            &self.log_root,
            &self.listed_kinds(),
            list_from,
            end_version,
        )?;
        info!(
            "{table_path}: Took {}ms to list the files after starting checkpoint",
            listing_start.elapsed().as_millis()
        );

        if listed.is_empty() {
            return Err(match start_checkpoint {
                Some(version) => Error::missing_checkpoint(table_path, version),
                None => Error::table_not_found(
                    table_path,
                    format!("No delta files found in the directory: {}", self.log_root),
                ),
            });
        }

        let files = partition_listing(listed);
        files.log_debug();

        let checkpoint = latest_complete_checkpoint(&files.checkpoints, end_version);
        if let (None, Some(expected)) = (checkpoint, start_checkpoint) {
            return Err(Error::missing_checkpoint(table_path, expected));
        }
        let checkpoint_version = checkpoint.map(|cp| cp.version);
        match checkpoint_version {
            Some(v) => info!("Latest complete checkpoint version: {v}"),
            None => info!("No complete checkpoint in listing"),
        }

        let mut commits = select_commits(&files.commits, checkpoint_version, end_version);
        debug_files("listedDeltasAfterCheckpoint", &commits);
        let staged = select_staged_commits(
            table_path,
            staged_commits,
            &commits,
            checkpoint_version,
            end_version,
        )?;
        debug_files("suffixCommitsAfterDeltas", &staged);
        commits.extend(staged);

        let compactions = if self.use_compacted_files {
            select_compactions(&files.compactions, checkpoint_version, end_version)
        } else {
            Vec::new()
        };
        debug_files("compactionsAfterCheckpoint", &compactions);

        let new_version = validate_segment(
            table_path,
            &files.commits,
            checkpoint.as_ref(),
            &commits,
            end_version,
        )?;
        info!("New version to load: {new_version}");

        let checkpoint_parts = match &checkpoint {
            Some(cp) => collect_checkpoint_parts(table_path, &self.log_root, cp, &files.checkpoints)?,
            None => Vec::new(),
        };

        let latest_crc_file = latest_checksum(&files.checksums, checkpoint_version);

        let last_commit_timestamp = files
            .commits
            .last()
            .or(commits.last())
            .map(|c| c.location.last_modified)
            .ok_or_else(|| Error::internal(table_path, "validated segment has no commit file"))?;

        info!(
            "Successfully constructed LogSegment at version {new_version}, took {}ms",
            build_start.elapsed().as_millis()
        );

        Ok(LogSegment {
            log_root: self.log_root.clone(),
            end_version: new_version,
            ascending_commit_files: commits,
            ascending_compaction_files: compactions,
            checkpoint_parts,
            latest_crc_file,
            last_commit_timestamp,
        })
    }
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::last_checkpoint_hint::LAST_CHECKPOINT_FILE_NAME;
    use crate::listing::test_utils::MockStorage;
    use crate::path::{
        checkpoint_filename, checksum_filename, commit_filename, compaction_filename,
        multi_part_checkpoint_filename,
    };
    use crate::FileMeta;

    const TABLE: &str = "memory:///table/";

    fn parsed(name: &str) -> ParsedLogPath {
        ParsedLogPath::parse(FileMeta {
            location: MockStorage::log_root().join(name).unwrap(),
            last_modified: 0,
            size: 0,
        })
        .unwrap()
    }

    fn commits(versions: impl IntoIterator<Item = Version>) -> Vec<ParsedLogPath> {
        versions.into_iter().map(|v| parsed(&commit_filename(v))).collect()
    }

    fn versions(files: &[ParsedLogPath]) -> Vec<Version> {
        files.iter().map(|f| f.version).collect()
    }

    fn staged(version: Version) -> ParsedLogData {
        let location = MockStorage::log_root()
            .join(&format!(
                "_staged_commits/{version:020}.3a0d65cd-4056-49b8-937b-95f9e3ee90e5.json"
            ))
            .unwrap();
        ParsedLogData::for_staged_commit(FileMeta {
            location,
            last_modified: 1000 + version as i64,
            size: 1,
        })
        .unwrap()
    }

    fn builder() -> LogSegmentBuilder {
        LogSegmentBuilder::try_new(Url::parse(TABLE).unwrap(), &SnapshotManagerConfig::default())
            .unwrap()
    }

    fn storage_with(names: &[String]) -> MockStorage {
        MockStorage::with_files(names.iter().map(String::as_str))
    }

    // ===== pure steps =====

    #[test]
    fn test_partition_listing_preserves_order() {
        let files = vec![
            parsed("00000000000000000000.json"),
            parsed("00000000000000000001.checkpoint.parquet"),
            parsed("00000000000000000001.crc"),
            parsed("00000000000000000001.json"),
            parsed("00000000000000000002.00000000000000000003.compacted.json"),
            parsed("00000000000000000002.json"),
        ];
        let partitioned = partition_listing(files);
        assert_eq!(versions(&partitioned.commits), vec![0, 1, 2]);
        assert_eq!(versions(&partitioned.checkpoints), vec![1]);
        assert_eq!(versions(&partitioned.checksums), vec![1]);
        assert_eq!(versions(&partitioned.compactions), vec![2]);
    }

    #[test]
    fn test_select_commits_range() {
        let listed = commits(0..10);
        assert_eq!(versions(&select_commits(&listed, None, None)), (0..10).collect::<Vec<_>>());
        assert_eq!(versions(&select_commits(&listed, Some(5), None)), vec![6, 7, 8, 9]);
        assert_eq!(versions(&select_commits(&listed, Some(5), Some(7))), vec![6, 7]);
        assert!(select_commits(&listed, Some(9), None).is_empty());
    }

    #[test]
    fn test_select_staged_commits_appends_after_listed() {
        let listed = commits(0..=5);
        let staged_commits = vec![staged(4), staged(6), staged(7), staged(9)];
        // 4 collides with a listed commit
        let err = select_staged_commits(TABLE, &staged_commits, &listed, None, None).unwrap_err();
        assert!(matches!(err, Error::StagedCommitConflict { version: 4, .. }));

        let staged_commits = vec![staged(6), staged(7), staged(9)];
        let selected = select_staged_commits(TABLE, &staged_commits, &listed, None, Some(7)).unwrap();
        assert_eq!(versions(&selected), vec![6, 7]);
        assert!(selected.iter().all(|c| c.kind() == LogFileKind::Commit));
    }

    #[test]
    fn test_select_staged_commits_skips_inline_and_covered() {
        let inline = ParsedLogData::for_inline_commit(6, Bytes::new());
        let selected =
            select_staged_commits(TABLE, &[staged(3), inline, staged(7)], &[], Some(5), None)
                .unwrap();
        // 3 is covered by the checkpoint, 6 is not materialized
        assert_eq!(versions(&selected), vec![7]);
    }

    #[test]
    fn test_select_staged_commits_without_listed_commits() {
        let selected =
            select_staged_commits(TABLE, &[staged(0), staged(1)], &[], None, None).unwrap();
        assert_eq!(versions(&selected), vec![0, 1]);
    }

    #[test]
    fn test_select_compactions_range() {
        let compactions = vec![
            parsed(&compaction_filename(1, 4)),
            parsed(&compaction_filename(6, 8)),
            parsed(&compaction_filename(6, 12)),
        ];
        assert_eq!(versions(&select_compactions(&compactions, Some(5), Some(10))), vec![6]);
        assert_eq!(versions(&select_compactions(&compactions, None, None)), vec![1, 6, 6]);
        assert_eq!(versions(&select_compactions(&compactions, Some(1), None)), vec![6, 6]);
    }

    #[test]
    fn test_validate_contiguous_segment() {
        let cp = CheckpointInstance::new(5, None);
        let listed = commits(5..=8);
        let selected = commits(6..=7);
        assert_eq!(
            validate_segment(TABLE, &listed, Some(&cp), &selected, Some(7)).unwrap(),
            7
        );
        assert_eq!(validate_segment(TABLE, &listed, Some(&cp), &[], Some(5)).unwrap(), 5);
    }

    #[test]
    fn test_validate_requires_something() {
        let err = validate_segment(TABLE, &[], None, &[], None).unwrap_err();
        assert!(matches!(err, Error::InvalidTable { .. }));
    }

    #[test]
    fn test_validate_requires_checkpoint_commit() {
        let cp = CheckpointInstance::new(5, None);
        let err = validate_segment(TABLE, &commits(6..=7), Some(&cp), &commits(6..=7), None)
            .unwrap_err();
        assert!(matches!(err, Error::MissingDeltaFile { version: 5, .. }));
    }

    #[test]
    fn test_validate_exact_version() {
        let listed = commits(0..=3);
        let err = validate_segment(TABLE, &listed, None, &listed, Some(5)).unwrap_err();
        assert!(matches!(
            err,
            Error::VersionNotYetAvailable {
                requested: 5,
                latest: 3,
                ..
            }
        ));

        let err = validate_segment(TABLE, &listed, None, &listed, Some(2)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_validate_names_first_missing_version() {
        let listed = commits([0, 1, 3, 5]);
        let err = validate_segment(TABLE, &listed, None, &listed, None).unwrap_err();
        assert!(matches!(err, Error::MissingDeltaFile { version: 2, .. }));

        let cp = CheckpointInstance::new(5, None);
        let listed = commits([5, 7, 8]);
        let err =
            validate_segment(TABLE, &listed, Some(&cp), &commits([7, 8]), None).unwrap_err();
        assert!(matches!(err, Error::MissingDeltaFile { version: 6, .. }));

        let listed = commits([1, 2]);
        let err = validate_segment(TABLE, &listed, None, &listed, None).unwrap_err();
        assert!(matches!(err, Error::MissingDeltaFile { version: 0, .. }));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let listed = commits([0, 1, 1]);
        let err = validate_segment(TABLE, &listed, None, &listed, None).unwrap_err();
        assert!(matches!(err, Error::InvalidTable { .. }));
    }

    #[test]
    fn test_collect_checkpoint_parts() {
        let root = MockStorage::log_root();
        let cp = CheckpointInstance::new(4, Some(2));
        let files = vec![
            parsed(&multi_part_checkpoint_filename(4, 1, 2)),
            parsed(&multi_part_checkpoint_filename(4, 2, 2)),
            parsed(&multi_part_checkpoint_filename(4, 1, 3)),
            parsed(&checkpoint_filename(4)),
        ];
        let parts = collect_checkpoint_parts(TABLE, &root, &cp, &files).unwrap();
        assert_eq!(parts.len(), 2);

        let err = collect_checkpoint_parts(TABLE, &root, &cp, &files[..1]).unwrap_err();
        assert!(matches!(
            err,
            Error::CheckpointCorrupted {
                version: 4,
                expected_parts: 2,
                found_parts: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_latest_checksum() {
        let checksums = vec![parsed(&checksum_filename(3)), parsed(&checksum_filename(6))];
        assert_eq!(latest_checksum(&checksums, Some(5)).map(|c| c.version), Some(6));
        assert_eq!(latest_checksum(&checksums, Some(7)), None);
        assert_eq!(latest_checksum(&checksums, None).map(|c| c.version), Some(6));
        assert_eq!(latest_checksum(&[], None), None);
    }

    #[test]
    fn test_try_new_normalizes_roots() {
        let builder = LogSegmentBuilder::try_new(
            Url::parse("memory:///table").unwrap(),
            &SnapshotManagerConfig::default(),
        )
        .unwrap();
        assert_eq!(builder.table_root().as_str(), "memory:///table/");
        assert_eq!(builder.log_root().as_str(), "memory:///table/_delta_log/");
    }

    // ===== full builds =====

    #[test]
    fn test_build_latest_without_checkpoint() {
        let storage = storage_with(&(0..10).map(commit_filename).collect::<Vec<_>>());
        let segment = builder().build(&storage, None, &[]).unwrap();
        assert_eq!(segment.end_version(), 9);
        assert_eq!(segment.commit_versions(), (0..10).collect::<Vec<_>>());
        assert!(!segment.has_checkpoint());
        assert_eq!(segment.last_commit_timestamp(), 90);
        assert_eq!(segment.log_root().as_str(), "memory:///table/_delta_log/");
    }

    #[test]
    fn test_build_at_version_with_checkpoint() {
        let mut names: Vec<String> = (0..=8).map(commit_filename).collect();
        names.push(checkpoint_filename(5));
        names.push(checksum_filename(7));
        let storage = storage_with(&names);

        let segment = builder().build(&storage, Some(7), &[]).unwrap();
        assert_eq!(segment.end_version(), 7);
        assert_eq!(segment.checkpoint_version(), Some(5));
        assert_eq!(segment.checkpoint_parts().len(), 1);
        assert_eq!(segment.commit_versions(), vec![6, 7]);
        assert_eq!(segment.latest_crc_file().map(|c| c.version), Some(7));
    }

    #[test]
    fn test_build_uses_last_checkpoint_pointer() {
        let mut names: Vec<String> = (0..=12).map(commit_filename).collect();
        names.push(checkpoint_filename(10));
        let storage = storage_with(&names);
        storage.put(LAST_CHECKPOINT_FILE_NAME, 0, r#"{"version":10,"size":3}"#);

        let segment = builder().build(&storage, None, &[]).unwrap();
        assert_eq!(segment.checkpoint_version(), Some(10));
        assert_eq!(segment.commit_versions(), vec![11, 12]);
        assert_eq!(
            storage.list_calls.lock().unwrap().as_slice(),
            ["00000000000000000010"]
        );
    }

    #[test]
    fn test_build_finds_newer_checkpoint_than_pointer() {
        let mut names: Vec<String> = (0..=12).map(commit_filename).collect();
        names.push(checkpoint_filename(5));
        names.push(multi_part_checkpoint_filename(10, 1, 2));
        names.push(multi_part_checkpoint_filename(10, 2, 2));
        let storage = storage_with(&names);
        storage.put(LAST_CHECKPOINT_FILE_NAME, 0, r#"{"version":5}"#);

        let segment = builder().build(&storage, None, &[]).unwrap();
        assert_eq!(segment.checkpoint_version(), Some(10));
        assert_eq!(segment.checkpoint_parts().len(), 2);
        assert_eq!(segment.commit_versions(), vec![11, 12]);
    }

    #[test]
    fn test_build_pointer_to_missing_checkpoint() {
        let storage = storage_with(&(0..=4).map(commit_filename).collect::<Vec<_>>());
        storage.put(LAST_CHECKPOINT_FILE_NAME, 0, r#"{"version":5}"#);
        let err = builder().build(&storage, None, &[]).unwrap_err();
        assert!(matches!(err, Error::MissingCheckpoint { version: 5, .. }));

        // commits after the pointer exist, but the checkpoint itself is gone
        storage.put(&commit_filename(5), 0, "");
        storage.put(&commit_filename(6), 0, "");
        let err = builder().build(&storage, None, &[]).unwrap_err();
        assert!(matches!(err, Error::MissingCheckpoint { version: 5, .. }));
    }

    #[test]
    fn test_build_pointer_ignored_when_disabled() {
        let storage = storage_with(&(0..=4).map(commit_filename).collect::<Vec<_>>());
        storage.put(LAST_CHECKPOINT_FILE_NAME, 0, r#"{"version":5}"#);
        let builder = LogSegmentBuilder::try_new(
            Url::parse(TABLE).unwrap(),
            &SnapshotManagerConfig::default().with_last_checkpoint(false),
        )
        .unwrap();
        assert_eq!(builder.build(&storage, None, &[]).unwrap().end_version(), 4);
    }

    #[test]
    fn test_build_empty_table_not_found() {
        let storage = MockStorage::default();
        let err = builder().build(&storage, None, &[]).unwrap_err();
        assert!(matches!(err, Error::TableNotFound { .. }));
        assert!(err.to_string().contains("memory:///table/"));
    }

    #[test]
    fn test_build_gap_fails() {
        let storage = storage_with(&[0, 1, 3].map(commit_filename));
        let err = builder().build(&storage, None, &[]).unwrap_err();
        assert!(matches!(err, Error::MissingDeltaFile { version: 2, .. }));
    }

    #[test]
    fn test_build_version_beyond_latest() {
        let storage = storage_with(&(0..=3).map(commit_filename).collect::<Vec<_>>());
        let err = builder().build(&storage, Some(10), &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::VersionNotYetAvailable {
                requested: 10,
                latest: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_build_incomplete_newest_checkpoint_falls_back() {
        let mut names: Vec<String> = (0..=12).map(commit_filename).collect();
        names.push(checkpoint_filename(5));
        names.push(multi_part_checkpoint_filename(10, 1, 2));
        let storage = storage_with(&names);

        let segment = builder().build(&storage, Some(12), &[]).unwrap();
        assert_eq!(segment.checkpoint_version(), Some(5));
        assert_eq!(segment.commit_versions(), (6..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_build_pointer_to_partially_listed_checkpoint() {
        let mut names: Vec<String> = (0..=9).map(commit_filename).collect();
        names.push(multi_part_checkpoint_filename(5, 1, 2));
        let storage = storage_with(&names);
        storage.put(LAST_CHECKPOINT_FILE_NAME, 0, r#"{"version":5,"size":10,"parts":2}"#);

        let err = builder().build(&storage, None, &[]).unwrap_err();
        assert!(matches!(err, Error::MissingCheckpoint { version: 5, .. }));
        assert!(err.is_invalid_table());
    }

    #[test]
    fn test_build_staged_commit_colliding_with_listed_commit() {
        let storage = storage_with(&(0..=5).map(commit_filename).collect::<Vec<_>>());
        let err = builder()
            .build(&storage, None, &[staged(5), staged(6)])
            .unwrap_err();
        assert!(matches!(err, Error::StagedCommitConflict { version: 5, .. }));
    }

    #[test]
    fn test_build_merges_staged_commits() {
        let storage = storage_with(&(0..=5).map(commit_filename).collect::<Vec<_>>());
        let segment = builder()
            .build(&storage, None, &[staged(6), staged(7)])
            .unwrap();
        assert_eq!(segment.end_version(), 7);
        assert_eq!(segment.commit_versions(), (0..=7).collect::<Vec<_>>());
        // timestamp comes from the newest listed commit, not the staged ones
        assert_eq!(segment.last_commit_timestamp(), 50);
        assert!(segment.ascending_commit_files()[7]
            .location
            .location
            .path()
            .contains("_staged_commits"));
    }

    #[test]
    fn test_build_staged_gap_fails() {
        let storage = storage_with(&(0..=5).map(commit_filename).collect::<Vec<_>>());
        let err = builder().build(&storage, None, &[staged(7)]).unwrap_err();
        assert!(matches!(err, Error::MissingDeltaFile { version: 6, .. }));
    }

    #[test]
    fn test_build_rejects_unsorted_staged_commits() {
        let storage = storage_with(&(0..=5).map(commit_filename).collect::<Vec<_>>());
        let err = builder()
            .build(&storage, None, &[staged(7), staged(6)])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_build_only_staged_commits() {
        let storage = storage_with(&[checksum_filename(0)]);
        let segment = builder()
            .build(&storage, None, &[staged(0), staged(1)])
            .unwrap();
        assert_eq!(segment.commit_versions(), vec![0, 1]);
        assert_eq!(segment.last_commit_timestamp(), 1001);
    }

    #[test]
    fn test_build_compactions_toggle() {
        let mut names: Vec<String> = (0..=6).map(commit_filename).collect();
        names.push(compaction_filename(1, 3));
        names.push(compaction_filename(4, 6));
        let storage = storage_with(&names);

        let segment = builder().build(&storage, None, &[]).unwrap();
        assert_eq!(versions(segment.ascending_compaction_files()), vec![1, 4]);

        let segment = builder().build(&storage, Some(5), &[]).unwrap();
        assert_eq!(versions(segment.ascending_compaction_files()), vec![1]);

        let segment = LogSegmentBuilder::try_new(
            Url::parse(TABLE).unwrap(),
            &SnapshotManagerConfig::default().with_compacted_files(false),
        )
        .unwrap()
        .build(&storage, None, &[])
        .unwrap();
        assert!(segment.ascending_compaction_files().is_empty());
    }

    #[test]
    fn test_build_checkpoint_without_its_commit() {
        let mut names: Vec<String> = (6..=8).map(commit_filename).collect();
        names.push(checkpoint_filename(5));
        let storage = storage_with(&names);
        let err = builder().build(&storage, Some(8), &[]).unwrap_err();
        assert!(matches!(err, Error::MissingDeltaFile { version: 5, .. }));
    }

    #[test]
    fn test_build_at_checkpoint_version() {
        let mut names: Vec<String> = (0..=8).map(commit_filename).collect();
        names.push(checkpoint_filename(5));
        let storage = storage_with(&names);
        let segment = builder().build(&storage, Some(5), &[]).unwrap();
        assert_eq!(segment.end_version(), 5);
        assert!(segment.ascending_commit_files().is_empty());
        assert_eq!(segment.checkpoint_version(), Some(5));
    }

    #[test]
    fn test_build_checkpoint_removed_between_search_and_listing() {
        // The search finds the checkpoint, then it disappears before the main listing.
        struct Flaky {
            inner: MockStorage,
            calls: std::sync::atomic::AtomicUsize,
        }
        impl StorageHandler for Flaky {
            fn list_from(&self, path: &Url, end_before: Option<&Url>) -> DeltaResult<Vec<FileMeta>> {
                use std::sync::atomic::Ordering;
                if self.calls.fetch_add(1, Ordering::SeqCst) == 1 {
                    self.inner.remove(&checkpoint_filename(5));
                }
                self.inner.list_from(path, end_before)
            }
            fn read(&self, location: &Url) -> DeltaResult<Option<Bytes>> {
                self.inner.read(location)
            }
        }

        let mut names: Vec<String> = (0..=8).map(commit_filename).collect();
        names.push(checkpoint_filename(5));
        let storage = Flaky {
            inner: storage_with(&names),
            calls: Default::default(),
        };
        let err = builder().build(&storage, Some(7), &[]).unwrap_err();
        assert!(matches!(err, Error::MissingCheckpoint { version: 5, .. }));
    }
}
