//! `airsync diff <csv>`: show unified diffs of what sync would change.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use airsync_sync::{diff_at, ErrorPolicy};

/// Arguments for `airsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Path to an OurAirports `airports.csv`.
    pub dataset: PathBuf,

    /// Leave failing records out of the diff instead of aborting.
    #[arg(long)]
    pub skip_invalid: bool,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let policy = if self.skip_invalid {
            ErrorPolicy::Skip
        } else {
            ErrorPolicy::Abort
        };

        let result = diff_at(&home, &self.dataset, policy)
            .with_context(|| format!("diff failed for '{}'", self.dataset.display()))?;

        for failure in &result.failures {
            eprintln!("skipped line {}: {}", failure.line, failure.error);
        }

        if result.diffs.is_empty() {
            println!("No differences for '{}'.", self.dataset.display());
            return Ok(());
        }

        for diff in result.diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}
