//! `airsync sync <csv>`: reconcile a dataset against the registry.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use airsync_reconcile::AuditRecord;
use airsync_sync::{
    pipeline::{self, ErrorPolicy, RunOptions, RunSummary},
    DecisionCounts, ExecutionMode, FailedRecord, WriteResult,
};

/// Arguments for `airsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Path to an OurAirports `airports.csv`.
    pub dataset: PathBuf,

    /// Write changes to the registry. Without it nothing is persisted.
    #[arg(long)]
    pub live_run: bool,

    /// Log and skip records that fail instead of aborting the run.
    #[arg(long)]
    pub skip_invalid: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;

        let options = RunOptions {
            mode: if self.live_run {
                ExecutionMode::Commit
            } else {
                ExecutionMode::DryRun
            },
            policy: if self.skip_invalid {
                ErrorPolicy::Skip
            } else {
                ErrorPolicy::Abort
            },
        };

        let summary = pipeline::run(&home, &self.dataset, options)
            .with_context(|| format!("sync failed for '{}'", self.dataset.display()))?;

        if self.json {
            return print_json(&summary);
        }
        print_summary(&self.dataset, &summary);
        Ok(())
    }
}

#[derive(Serialize)]
struct SyncReportJson<'a> {
    mode: ExecutionMode,
    counts: &'a DecisionCounts,
    failures: &'a [FailedRecord],
    operations: Vec<OperationJson>,
    journal: String,
}

#[derive(Serialize)]
struct OperationJson {
    sql: String,
    rows: usize,
    applied: bool,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "decision")]
    decision: &'static str,
    #[tabled(rename = "records")]
    records: usize,
}

fn print_json(summary: &RunSummary) -> Result<()> {
    let payload = SyncReportJson {
        mode: summary.mode,
        counts: &summary.counts,
        failures: &summary.failures,
        operations: summary
            .writes
            .iter()
            .filter(|w| w.rows() > 0)
            .map(|w| OperationJson {
                sql: w.op().to_string(),
                rows: w.rows(),
                applied: matches!(w, WriteResult::Applied { .. }),
            })
            .collect(),
        journal: summary.journal_path.display().to_string(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize sync JSON")?
    );
    Ok(())
}

fn print_summary(dataset: &std::path::Path, summary: &RunSummary) {
    let dry_run = summary.mode.is_dry_run();
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let counts = &summary.counts;

    for record in &summary.records {
        print_record(record);
    }

    for write in summary.writes.iter().filter(|w| w.rows() > 0) {
        match write {
            WriteResult::WouldApply { op, .. } => println!("[dry-run] {op}"),
            WriteResult::Applied { op, rows } => println!("  ✎  {op} ({rows} rows)"),
        }
    }

    println!(
        "{prefix}✓ '{}' reconciled ({} changed, {} unchanged, {} ignored, {} failed)",
        dataset.display(),
        counts.changed(),
        counts.unchanged,
        counts.closed + counts.not_eligible,
        counts.failed
    );

    let rows = vec![
        CountRow { decision: "updated", records: counts.updated },
        CountRow { decision: "recoded", records: counts.recoded },
        CountRow { decision: "transferred", records: counts.transferred },
        CountRow { decision: "inserted", records: counts.inserted },
        CountRow { decision: "unchanged", records: counts.unchanged },
        CountRow { decision: "closed", records: counts.closed },
        CountRow { decision: "not eligible", records: counts.not_eligible },
        CountRow { decision: "failed", records: counts.failed },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for failure in &summary.failures {
        println!(
            "{} line {}: {}",
            "skipped".yellow().bold(),
            failure.line,
            failure.error
        );
    }

    println!("  Journal: {}", summary.journal_path.display());
    if dry_run && counts.changed() > 0 {
        println!("Run again with --live-run to apply these changes.");
    }
}

fn print_record(record: &AuditRecord) {
    if record.is_noop() {
        return;
    }
    println!(
        "{} {} ({}) [{}]",
        record.decision.label().bold(),
        record.ident,
        record.name,
        record.changed_fields.join(", ")
    );
    for note in &record.notes {
        println!("  . {note}");
    }
}
