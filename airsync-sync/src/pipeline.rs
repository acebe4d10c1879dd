//! Shared reconciliation pipeline used by `airsync sync` and `airsync diff`.
//!
//! load registry → build index → stream dataset → reconcile each record →
//! stage intents in the writer → finish → write journal.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::Utc;

use airsync_core::{registry, types::Registry};
use airsync_reconcile::{AuditRecord, Decision, Reconciler, RegistryIndex};

use crate::error::SyncError;
use crate::journal::{self, DecisionCounts, FailedRecord, Journal};
use crate::source::{RecordSource, SourceRecord};
use crate::writer::{ExecutionMode, RegistryWriter, WriteResult};

/// What to do when a single record fails decoding or reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop at the first bad record; nothing is persisted.
    #[default]
    Abort,
    /// Log the record, count it as failed and carry on.
    Skip,
}

/// Options for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub mode: ExecutionMode,
    pub policy: ErrorPolicy,
}

/// Outcome of a pipeline run.
#[derive(Debug)]
pub struct RunSummary {
    pub mode: ExecutionMode,
    pub counts: DecisionCounts,
    pub failures: Vec<FailedRecord>,
    /// Audit records of every record that was not ignored, in input order.
    pub records: Vec<AuditRecord>,
    /// Row operations, in execution order.
    pub writes: Vec<WriteResult>,
    pub journal_path: PathBuf,
}

/// Result of [`reconcile_records`]: the staged writer plus bookkeeping.
pub(crate) struct Reconciled {
    pub writer: RegistryWriter,
    pub counts: DecisionCounts,
    pub failures: Vec<FailedRecord>,
    pub records: Vec<AuditRecord>,
    pub writes: Vec<WriteResult>,
}

/// Reconcile `records` in order against `registry`, staging every intent.
pub(crate) fn reconcile_records<R: Read>(
    registry: Registry,
    records: RecordSource<R>,
    options: RunOptions,
) -> Result<Reconciled, SyncError> {
    let mut reconciler = Reconciler::new(RegistryIndex::from_registry(&registry));
    let mut writer = RegistryWriter::new(registry, options.mode);
    let mut counts = DecisionCounts::default();
    let mut failures = Vec::new();
    let mut audits = Vec::new();
    let mut writes = Vec::new();

    for item in records {
        let SourceRecord { line, record } = match item {
            Ok(decoded) => decoded,
            Err(SyncError::Decode { line, message, .. }) if options.policy == ErrorPolicy::Skip => {
                tracing::warn!("skipping line {line}: {message}");
                counts.failed += 1;
                failures.push(FailedRecord {
                    line,
                    ident: String::new(),
                    error: message,
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        let audit = match reconciler.reconcile(&record) {
            Ok(audit) => audit,
            Err(e) if options.policy == ErrorPolicy::Skip => {
                tracing::warn!("skipping line {line}: {e}");
                counts.failed += 1;
                failures.push(FailedRecord {
                    line,
                    ident: e.ident().to_owned(),
                    error: e.to_string(),
                });
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        // A writer conflict means index and registry disagree; always fatal.
        writes.extend(writer.apply(&audit.intents)?);
        counts.record(&audit);
        if !matches!(audit.decision, Decision::Ignore(_)) {
            audits.push(audit);
        }
    }

    Ok(Reconciled {
        writer,
        counts,
        failures,
        records: audits,
        writes,
    })
}

/// Run the full pipeline for `dataset` against the registry under `home`.
pub fn run(home: &Path, dataset: &Path, options: RunOptions) -> Result<RunSummary, SyncError> {
    let started_at = Utc::now();
    let registry = registry::load_at(home)?;
    let dataset_sha256 = journal::digest_file(dataset)?;
    tracing::info!(
        "{} run over {} ({} airports, {} flights in registry)",
        options.mode,
        dataset.display(),
        registry.airports.len(),
        registry.flights.len()
    );

    let reconciled = reconcile_records(registry, RecordSource::open(dataset)?, options)?;
    reconciled.writer.finish(home)?;

    let journal = Journal {
        mode: options.mode,
        dataset: dataset.to_path_buf(),
        dataset_sha256,
        started_at,
        finished_at: Utc::now(),
        counts: reconciled.counts,
        failures: reconciled.failures,
        records: reconciled.records,
    };
    let journal_path = journal::save_at(home, &journal)?;

    Ok(RunSummary {
        mode: journal.mode,
        counts: journal.counts,
        failures: journal.failures,
        records: journal.records,
        writes: reconciled.writes,
        journal_path,
    })
}
