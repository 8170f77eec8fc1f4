//! The date-partitioned CSV ledger: partition resolution and the
//! merge-on-write cycle.
//!
//! Layout is `root/<year>/<monthName>/<day>.csv`, one partition per local
//! calendar day. Each record is one line of the exact form
//! `"<signature>",<count>`: signature double-quoted, count a decimal
//! integer, no header, no escaping. Because there is no escaping, the
//! delimiter is stripped from signatures at the point of capture
//! ([`sanitize_signature`]) rather than handled here.
//!
//! The merge is keyed by exact signature equality: every signature present in
//! the prior content or in the delta ends up with exactly one record whose
//! count is the sum of both sides. The partition is truncated and rewritten
//! as a whole, so no stale or duplicate lines survive a merge.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::{DirBuilder, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local};
use thiserror::Error;

/// Field separator of the on-disk record format.
pub const RECORD_DELIMITER: char = ',';

/// Extension of partition files.
pub const PARTITION_EXTENSION: &str = "csv";

/// Month directory names, spelled out rather than zero-padded numbers so the
/// ledger stays browsable. This trades away lexical sort order of the month
/// directories.
const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Remove every occurrence of the record delimiter from a raw signature.
///
/// Total and deterministic. The ledger format has no quoting or escaping
/// scheme, so an embedded delimiter must be eliminated here, before the
/// signature ever reaches the counter.
pub fn sanitize_signature(raw: &str) -> String {
    raw.chars().filter(|c| *c != RECORD_DELIMITER).collect()
}

// ============================================================================
// Errors
// ============================================================================

/// A failed flush cycle.
///
/// Every variant is recoverable: the cycle is abandoned, the delta stays in
/// memory and the next tick retries. Nothing here escalates to the request
/// path.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error("failed to create ledger directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open ledger partition {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write ledger partition {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A prior partition line that does not parse as `"<signature>",<count>`.
///
/// Surfaced as a warning and skipped during the merge so unrelated records
/// are not lost; never fatal.
#[derive(Debug, Error)]
#[error("line {line_no}: malformed ledger record `{line}`")]
pub struct RecordParseError {
    pub line_no: usize,
    pub line: String,
}

// ============================================================================
// Partition resolution
// ============================================================================

/// The (year, month, day) triple identifying one calendar day's partition.
///
/// Recomputed from the local clock once per flush cycle; two cycles on the
/// same local calendar day resolve to the identical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl PartitionKey {
    pub fn for_timestamp(stamp: &DateTime<Local>) -> Self {
        Self {
            year: stamp.year(),
            month: stamp.month(),
            day: stamp.day(),
        }
    }

    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// Directory holding this partition: `root/<year>/<monthName>`.
    pub fn directory(&self, root: &Path) -> PathBuf {
        root.join(self.year.to_string()).join(self.month_name())
    }

    /// Unpadded day plus the fixed extension, e.g. `7.csv`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.day, PARTITION_EXTENSION)
    }

    pub fn partition_path(&self, root: &Path) -> PathBuf {
        self.directory(root).join(self.file_name())
    }
}

/// Create the partition directory and any missing intermediates with fixed
/// permissive rights. An already-existing directory is not an error.
fn ensure_partition_dir(root: &Path, key: &PartitionKey) -> Result<PathBuf, FlushError> {
    let dir = key.directory(root);

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o777);
    }
    builder
        .create(&dir)
        .map_err(|source| FlushError::DirectoryCreation {
            path: dir.clone(),
            source,
        })?;

    Ok(dir)
}

// ============================================================================
// Record format
// ============================================================================

fn parse_record(line_no: usize, line: &str) -> Result<(String, u64), RecordParseError> {
    let malformed = || RecordParseError {
        line_no,
        line: line.to_string(),
    };

    // Sanitized signatures contain no delimiter, so the split point is the
    // last (and only) one on a well-formed line.
    let (quoted, count) = line.rsplit_once(RECORD_DELIMITER).ok_or_else(malformed)?;
    let signature = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(malformed)?;
    let count: u64 = count.parse().map_err(|_| malformed())?;

    Ok((signature.to_string(), count))
}

fn serialize_record(signature: &str, count: u64) -> String {
    format!("\"{signature}\",{count}")
}

// ============================================================================
// Merge
// ============================================================================

/// Summary of a successful merge.
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// Path of the partition that was rewritten.
    pub partition: PathBuf,
    /// Records in the rewritten partition.
    pub records: usize,
    /// Delta signatures that already had a prior record.
    pub merged_signatures: usize,
    /// Prior lines dropped because they failed to parse.
    pub skipped_lines: usize,
}

/// Reconcile `delta` against the partition for `stamp`'s calendar day.
///
/// Afterwards the partition contains, for every signature in the prior
/// content or the delta, exactly one record with count prior + delta (prior
/// being 0 for new signatures). Records are rewritten in lexicographic
/// signature order; the format guarantees no trailing newline.
pub fn merge_into_partition(
    root: &Path,
    stamp: &DateTime<Local>,
    delta: &BTreeMap<String, u64>,
) -> Result<MergeReport, FlushError> {
    let key = PartitionKey::for_timestamp(stamp);
    ensure_partition_dir(root, &key)?;
    let path = key.partition_path(root);

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&path)
        .map_err(|source| FlushError::FileOpen {
            path: path.clone(),
            source,
        })?;

    let mut prior = String::new();
    file.read_to_string(&mut prior)
        .map_err(|source| FlushError::FileOpen {
            path: path.clone(),
            source,
        })?;

    let mut records: BTreeMap<String, u64> = BTreeMap::new();
    let mut skipped_lines = 0usize;
    for (idx, line) in prior.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        match parse_record(idx + 1, line) {
            Ok((signature, count)) => match records.entry(signature) {
                Entry::Vacant(slot) => {
                    slot.insert(count);
                }
                // Signatures are supposed to be unique within a partition;
                // summing restores the invariant on rewrite.
                Entry::Occupied(mut slot) => {
                    tracing::warn!(
                        partition = %path.display(),
                        line = idx + 1,
                        signature = %slot.key(),
                        "duplicate signature in prior partition content; summing counts"
                    );
                    let merged = slot.get().saturating_add(count);
                    slot.insert(merged);
                }
            },
            Err(err) => {
                skipped_lines += 1;
                tracing::warn!(
                    partition = %path.display(),
                    error = %err,
                    "skipping malformed ledger record"
                );
            }
        }
    }

    let mut merged_signatures = 0usize;
    for (signature, count) in delta {
        match records.entry(signature.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(*count);
            }
            Entry::Occupied(mut slot) => {
                merged_signatures += 1;
                let merged = slot.get().saturating_add(*count);
                slot.insert(merged);
            }
        }
    }

    let body = records
        .iter()
        .map(|(signature, count)| serialize_record(signature, *count))
        .collect::<Vec<_>>()
        .join("\n");

    let write_err = |source| FlushError::Write {
        path: path.clone(),
        source,
    };
    file.set_len(0).map_err(write_err)?;
    file.seek(SeekFrom::Start(0)).map_err(write_err)?;
    file.write_all(body.as_bytes()).map_err(write_err)?;

    Ok(MergeReport {
        partition: path,
        records: records.len(),
        merged_signatures,
        skipped_lines,
    })
}
