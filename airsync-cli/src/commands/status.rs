//! `airsync status`: registry size and last-run visibility.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use airsync_core::{registry, types::Registry};
use airsync_sync::{journal, DecisionCounts, ExecutionMode, Journal};

/// Arguments for `airsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;

        let registry = registry::load_at(&home)
            .context("failed to load registry; run `airsync init` first")?;
        let last_run = journal::load_latest_at(&home).context("failed to load run journal")?;

        let report = build_report(&home, &registry, last_run);
        if self.json {
            print_json(&report)?;
            return Ok(());
        }

        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    registry: RegistrySummary,
    last_run: Option<LastRun>,
}

#[derive(Debug, Serialize)]
struct RegistrySummary {
    path: String,
    airports: usize,
    with_commercial_code: usize,
    flights: usize,
    countries: usize,
}

#[derive(Debug, Serialize)]
struct LastRun {
    mode: ExecutionMode,
    dataset: String,
    dataset_sha256: String,
    finished_at: String,
    age: String,
    counts: DecisionCounts,
}

#[derive(Tabled)]
struct RunTableRow {
    #[tabled(rename = "mode")]
    mode: String,
    #[tabled(rename = "dataset")]
    dataset: String,
    #[tabled(rename = "changed")]
    changed: usize,
    #[tabled(rename = "unchanged")]
    unchanged: usize,
    #[tabled(rename = "ignored")]
    ignored: usize,
    #[tabled(rename = "failed")]
    failed: usize,
    #[tabled(rename = "age")]
    age: String,
}

fn build_report(home: &Path, registry: &Registry, last_run: Option<Journal>) -> StatusReport {
    StatusReport {
        registry: RegistrySummary {
            path: registry::registry_dir_path_at(home).display().to_string(),
            airports: registry.airports.len(),
            with_commercial_code: registry
                .airports
                .iter()
                .filter(|a| a.commercial_code.is_some())
                .count(),
            flights: registry.flights.len(),
            countries: registry.countries.len(),
        },
        last_run: last_run.map(|j| LastRun {
            mode: j.mode,
            dataset: j.dataset.display().to_string(),
            dataset_sha256: j.dataset_sha256,
            finished_at: j.finished_at.to_rfc3339(),
            age: format_age(j.finished_at),
            counts: j.counts,
        }),
    }
}

fn print_json(report: &StatusReport) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(report).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(report: &StatusReport) {
    let summary = &report.registry;
    println!(
        "airsync v{} | {} airports ({} coded) | {} flights | {} countries",
        env!("CARGO_PKG_VERSION"),
        summary.airports,
        summary.with_commercial_code,
        summary.flights,
        summary.countries,
    );

    let Some(run) = &report.last_run else {
        println!("{}", "No runs recorded.".bright_black());
        return;
    };

    let counts = &run.counts;
    let mode = match run.mode {
        ExecutionMode::DryRun => run.mode.to_string().yellow().bold().to_string(),
        ExecutionMode::Commit => run.mode.to_string().green().bold().to_string(),
    };
    let mut table = Table::new([RunTableRow {
        mode,
        dataset: run.dataset.clone(),
        changed: counts.changed(),
        unchanged: counts.unchanged,
        ignored: counts.closed + counts.not_eligible,
        failed: counts.failed,
        age: run.age.clone(),
    }]);
    table.with(Style::rounded());
    println!("{table}");

    if run.mode == ExecutionMode::DryRun && counts.changed() > 0 {
        println!("Last run was a dry run. Run 'airsync sync <csv> --live-run' to apply.");
    }
}

fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0);
    if seconds < 60 {
        return format!("{seconds}s ago");
    }
    if seconds < 60 * 60 {
        return format!("{}m ago", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h ago", seconds / (60 * 60));
    }
    format!("{}d ago", seconds / (60 * 60 * 24))
}
