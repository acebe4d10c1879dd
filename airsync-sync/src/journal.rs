//! Run journal: JSON record of every reconciliation run.
//!
//! Persists a [`Journal`] document at `<home>/.airsync/journal/latest.json`.
//! Commit runs also keep a timestamped copy next to it. Writes use the same
//! atomic `.tmp` + rename pattern as the registry.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use airsync_reconcile::{AuditRecord, Decision, IgnoreReason};

use crate::error::{io_err, SyncError};
use crate::writer::ExecutionMode;

/// Per-decision record counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    pub closed: usize,
    pub not_eligible: usize,
    pub updated: usize,
    pub recoded: usize,
    pub transferred: usize,
    pub inserted: usize,
    /// Updates whose values already matched the registry.
    pub unchanged: usize,
    pub failed: usize,
}

impl DecisionCounts {
    pub fn record(&mut self, audit: &AuditRecord) {
        match audit.decision {
            Decision::Ignore(IgnoreReason::Closed) => self.closed += 1,
            Decision::Ignore(IgnoreReason::NotEligible) => self.not_eligible += 1,
            Decision::UpdateExisting if audit.is_noop() => self.unchanged += 1,
            Decision::UpdateExisting => self.updated += 1,
            Decision::RecodeExisting => self.recoded += 1,
            Decision::TransferAndMerge => self.transferred += 1,
            Decision::InsertNew => self.inserted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.closed
            + self.not_eligible
            + self.updated
            + self.recoded
            + self.transferred
            + self.inserted
            + self.unchanged
            + self.failed
    }

    /// Records that changed the registry.
    pub fn changed(&self) -> usize {
        self.updated + self.recoded + self.transferred + self.inserted
    }
}

/// A record skipped under the skip-invalid policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub line: u64,
    pub ident: String,
    pub error: String,
}

/// On-disk journal payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub mode: ExecutionMode,
    pub dataset: PathBuf,
    pub dataset_sha256: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: DecisionCounts,
    #[serde(default)]
    pub failures: Vec<FailedRecord>,
    /// Audit records of every record that was not ignored.
    #[serde(default)]
    pub records: Vec<AuditRecord>,
}

/// `~/.airsync/journal/`
pub fn journal_dir_at(home: &Path) -> PathBuf {
    home.join(".airsync").join("journal")
}

/// `~/.airsync/journal/latest.json`
pub fn latest_path_at(home: &Path) -> PathBuf {
    journal_dir_at(home).join("latest.json")
}

/// `~/.airsync/journal/<finished_at>.json`, e.g. `20240131T120000.123Z.json`.
pub fn archive_path_at(home: &Path, finished_at: DateTime<Utc>) -> PathBuf {
    journal_dir_at(home).join(format!("{}.json", archive_stem(finished_at)))
}

fn archive_stem(finished_at: DateTime<Utc>) -> String {
    finished_at.format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// First archive path not already taken. Runs finishing in the same
/// millisecond get a `-1`, `-2`, ... suffix.
fn unused_archive_path_at(home: &Path, finished_at: DateTime<Utc>) -> PathBuf {
    let path = archive_path_at(home, finished_at);
    if !path.exists() {
        return path;
    }
    let stem = archive_stem(finished_at);
    (1u32..)
        .map(|n| journal_dir_at(home).join(format!("{stem}-{n}.json")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(path)
}

/// SHA-256 hex digest of the dataset file.
pub fn digest_file(path: &Path) -> Result<String, SyncError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| io_err(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Load the most recent journal, or `None` if no run has been recorded.
pub fn load_latest_at(home: &Path) -> Result<Option<Journal>, SyncError> {
    let path = latest_path_at(home);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(&path, err)),
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save `journal` as the latest run, plus an archive copy for commit runs.
///
/// Returns the path of the latest journal.
pub fn save_at(home: &Path, journal: &Journal) -> Result<PathBuf, SyncError> {
    let dir = journal_dir_at(home);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let json = serde_json::to_string_pretty(journal)?;
    if journal.mode == ExecutionMode::Commit {
        write_atomic(&unused_archive_path_at(home, journal.finished_at), &json)?;
    }
    let latest = latest_path_at(home);
    write_atomic(&latest, &json)?;
    Ok(latest)
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), SyncError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}
