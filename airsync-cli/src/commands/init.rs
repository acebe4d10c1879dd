//! `airsync init [--countries <yaml>] [--airports <yaml>] [--flights <yaml>]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use airsync_core::registry::{self, SeedFiles};

/// Create the registry under ~/.airsync/registry/.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// YAML list of `{code, name}` rows to load as the country table.
    #[arg(long, value_name = "YAML")]
    pub countries: Option<PathBuf>,

    /// YAML list of airport rows to load as the airports table.
    #[arg(long, value_name = "YAML")]
    pub airports: Option<PathBuf>,

    /// YAML list of `{id, src, dst}` rows to load as the flights table.
    #[arg(long, value_name = "YAML")]
    pub flights: Option<PathBuf>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;

        let seeding = self.countries.is_some() || self.airports.is_some() || self.flights.is_some();
        let registry = if seeding {
            let files = SeedFiles {
                airports: self.airports,
                flights: self.flights,
                countries: self.countries,
            };
            registry::seed_at(&home, &files).context("failed to seed registry")?
        } else {
            registry::init_at(&home).context("failed to initialise registry")?
        };

        println!(
            "✓ Registry ready ({} airports, {} flights, {} countries)",
            registry.airports.len(),
            registry.flights.len(),
            registry.countries.len()
        );
        println!("  Saved to: {}", registry::registry_dir_path_at(&home).display());
        Ok(())
    }
}
