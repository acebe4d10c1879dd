//! Dry-run unified diff support for `airsync diff`.

use std::path::Path;

use serde::Serialize;
use similar::TextDiff;

use airsync_core::registry;

use crate::journal::{DecisionCounts, FailedRecord};
use crate::pipeline::{reconcile_records, ErrorPolicy, RunOptions};
use crate::source::RecordSource;
use crate::writer::ExecutionMode;
use crate::SyncError;

/// Unified diff of one registry table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDiff {
    /// Table file name, e.g. `airports.yaml`.
    pub table: &'static str,
    pub unified_diff: String,
}

/// Diff result for a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    pub counts: DecisionCounts,
    pub failures: Vec<FailedRecord>,
    pub diffs: Vec<TableDiff>,
}

/// Reconcile `dataset` in dry-run mode and compare the staged tables to the
/// stored ones.
///
/// Nothing is written, not even the run journal.
pub fn diff_at(home: &Path, dataset: &Path, policy: ErrorPolicy) -> Result<DiffResult, SyncError> {
    let current = registry::load_at(home)?;
    let options = RunOptions {
        mode: ExecutionMode::DryRun,
        policy,
    };
    let reconciled = reconcile_records(current.clone(), RecordSource::open(dataset)?, options)?;
    let staged = reconciled.writer.registry();

    let mut diffs = Vec::new();
    push_diff(&mut diffs, "airports.yaml", &current.airports, &staged.airports)?;
    push_diff(&mut diffs, "flights.yaml", &current.flights, &staged.flights)?;

    Ok(DiffResult {
        counts: reconciled.counts,
        failures: reconciled.failures,
        diffs,
    })
}

fn push_diff<T: Serialize>(
    diffs: &mut Vec<TableDiff>,
    table: &'static str,
    before: &[T],
    after: &[T],
) -> Result<(), SyncError> {
    let before = registry::render_rows(before)?;
    let after = registry::render_rows(after)?;
    if before == after {
        return Ok(());
    }

    let old_header = format!("a/{table}");
    let new_header = format!("b/{table}");
    let unified_diff = TextDiff::from_lines(&before, &after)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    diffs.push(TableDiff {
        table,
        unified_diff,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use airsync_core::types::{
        Airport, AirportId, CommercialCode, Country, Flight, FlightId, OperationalCode, Registry,
    };
    use tempfile::TempDir;

    use super::*;

    const HEADER: &str = "ident,type,name,latitude_deg,longitude_deg,elevation_ft,iso_country,municipality,iata_code,local_code\n";

    fn seed(home: &Path) {
        let airport = |id: u64, iata: &str, icao: &str| Airport {
            id: AirportId(id),
            name: format!("Airport {id}"),
            city: "City".into(),
            country: "United States".into(),
            commercial_code: Some(CommercialCode::from(iata)),
            operational_code: Some(OperationalCode::from(icao)),
            longitude: -73.5,
            latitude: 40.5,
            elevation: 12,
            kind: "airport".into(),
            source: "OurAirports".into(),
        };
        let registry = Registry {
            airports: vec![airport(1, "AAA", "KAAA"), airport(2, "BBB", "CBBB")],
            flights: vec![Flight {
                id: FlightId(7),
                src: AirportId(2),
                dst: AirportId(1),
            }],
            countries: vec![Country {
                code: "US".into(),
                name: "United States".into(),
            }],
        };
        registry::save_at(home, &registry).expect("seed");
    }

    fn dataset(home: &Path, body: &str) -> PathBuf {
        let path = home.join("airports.csv");
        fs::write(&path, format!("{HEADER}{body}")).expect("write dataset");
        path
    }

    #[test]
    fn matching_dataset_has_no_diff() {
        let home = TempDir::new().expect("home");
        seed(home.path());
        let csv = dataset(
            home.path(),
            "KAAA,large_airport,Airport 1,40.5,-73.5,12,US,City,AAA,\n",
        );

        let diff = diff_at(home.path(), &csv, ErrorPolicy::Abort).expect("diff");
        assert!(diff.diffs.is_empty(), "{:?}", diff.diffs);
        assert_eq!(diff.counts.unchanged, 1);
    }

    #[test]
    fn transfer_shows_in_both_tables() {
        let home = TempDir::new().expect("home");
        seed(home.path());
        let csv = dataset(
            home.path(),
            "KAAA,large_airport,Airport 1,40.5,-73.5,12,US,City,BBB,\n",
        );
        let before = fs::read_to_string(registry::airports_path_at(home.path())).unwrap();

        let diff = diff_at(home.path(), &csv, ErrorPolicy::Abort).expect("diff");
        let tables: Vec<_> = diff.diffs.iter().map(|d| d.table).collect();
        assert_eq!(tables, ["airports.yaml", "flights.yaml"]);

        let airports = &diff.diffs[0].unified_diff;
        assert!(airports.contains("--- a/airports.yaml"));
        assert!(airports.contains("+++ b/airports.yaml"));
        assert!(airports.contains("+  commercial_code: BBB"), "{airports}");
        assert!(diff.diffs[1].unified_diff.contains("@@"));

        assert_eq!(
            fs::read_to_string(registry::airports_path_at(home.path())).unwrap(),
            before,
            "diff must not write the registry"
        );
        assert!(!crate::journal::latest_path_at(home.path()).exists());
    }
}
