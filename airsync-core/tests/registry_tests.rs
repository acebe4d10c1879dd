//! Registry error-message, atomic-write-safety, init and seed integration tests.
//! Storage: ~/.airsync/registry/{airports,flights,countries}.yaml

use airsync_core::{
    registry::{self, SeedFiles},
    types::{Airport, AirportId, CommercialCode, Country, Flight, FlightId, OperationalCode, Registry},
    RegistryError,
};
use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;
use std::fs;

fn airport(id: u64, iata: Option<&str>, icao: Option<&str>) -> Airport {
    Airport {
        id: AirportId(id),
        name: format!("Airport {id}"),
        city: "Springfield".into(),
        country: "United States".into(),
        commercial_code: iata.map(CommercialCode::from),
        operational_code: icao.map(OperationalCode::from),
        longitude: -100.0,
        latitude: 35.0,
        elevation: 1000,
        kind: "airport".into(),
        source: "OpenFlights".into(),
    }
}

fn sample() -> Registry {
    Registry {
        airports: vec![airport(1, Some("AAA"), Some("KAAA")), airport(2, None, Some("KBBB"))],
        flights: vec![Flight { id: FlightId(1), src: AirportId(1), dst: AirportId(2) }],
        countries: vec![Country { code: "US".into(), name: "United States".into() }],
    }
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_without_init_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = registry::load_at(home.path()).unwrap_err();
    assert!(matches!(err, RegistryError::RegistryNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("registry not found"));
    assert!(err.to_string().contains("airports.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::init_at(home.path()).expect("init");
    fs::write(
        registry::flights_path_at(home.path()),
        b": : corrupt : yaml : !!!\n  - broken: [unclosed",
    )
    .expect("write");

    let err = registry::load_at(home.path()).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("flights.yaml"), "must contain file path, got: {msg}");
}

#[test]
fn load_wrong_shape_returns_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::init_at(home.path()).expect("init");
    fs::write(registry::countries_path_at(home.path()), b"code: US\nname: United States\n")
        .expect("write");

    let err = registry::load_at(home.path()).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }), "got: {err}");
}

#[test]
fn empty_table_file_loads_as_empty() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::init_at(home.path()).expect("init");
    fs::write(registry::flights_path_at(home.path()), b"").expect("truncate");

    let loaded = registry::load_at(home.path()).expect("load");
    assert!(loaded.flights.is_empty());
}

// ---------------------------------------------------------------------------
// 2. Validation
// ---------------------------------------------------------------------------

#[rstest]
#[case::duplicate_commercial(
    vec![airport(1, Some("AAA"), Some("KAAA")), airport(2, Some("AAA"), Some("KBBB"))],
    vec![],
    "commercial code AAA"
)]
#[case::duplicate_operational(
    vec![airport(1, Some("AAA"), Some("KAAA")), airport(2, Some("BBB"), Some("KAAA"))],
    vec![],
    "operational code KAAA"
)]
#[case::duplicate_id(
    vec![airport(1, None, None), airport(1, None, None)],
    vec![],
    "airport id 1 appears more than once"
)]
#[case::id_out_of_range(
    vec![airport(u64::MAX, None, None)],
    vec![],
    "airport id 18446744073709551615 is out of range"
)]
#[case::dangling_flight(
    vec![airport(1, None, None)],
    vec![Flight { id: FlightId(9), src: AirportId(1), dst: AirportId(5) }],
    "flight 9 references unknown airport 5"
)]
fn save_rejects_invalid_snapshots(
    #[case] airports: Vec<Airport>,
    #[case] flights: Vec<Flight>,
    #[case] expected: &str,
) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let registry = Registry { airports, flights, countries: vec![] };
    let err = registry::save_at(home.path(), &registry).unwrap_err();
    assert!(err.to_string().contains(expected), "got: {err}");
    home.child(".airsync/registry/airports.yaml")
        .assert(predicate::path::missing());
}

#[test]
fn unassigned_codes_never_collide() {
    let registry = Registry {
        airports: vec![airport(1, None, None), airport(2, None, None)],
        ..Registry::default()
    };
    registry::validate(&registry).expect("two unassigned codes are fine");
}

#[test]
fn blank_codes_load_as_unassigned() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::init_at(home.path()).expect("init");
    fs::write(
        registry::airports_path_at(home.path()),
        "- id: 1\n  name: Albuquerque\n  commercial_code: ABC\n  operational_code: ''\n  longitude: -106.6\n  latitude: 35.0\n\
         - id: 2\n  name: Second\n  commercial_code: ''\n  operational_code: '  '\n  longitude: 1.0\n  latitude: 2.0\n\
         - id: 3\n  name: Third\n  commercial_code: ' '\n  operational_code: null\n  longitude: 3.0\n  latitude: 4.0\n",
    )
    .expect("write");

    let loaded = registry::load_at(home.path()).expect("blank codes are unassigned, not duplicates");
    assert_eq!(loaded.airports[0].commercial_code, Some(CommercialCode::from("ABC")));
    for airport in &loaded.airports[1..] {
        assert_eq!(airport.commercial_code, None);
        assert_eq!(airport.operational_code, None);
    }
    assert_eq!(loaded.airports[0].operational_code, None);

    registry::save_at(home.path(), &loaded).expect("save");
    let contents = fs::read_to_string(registry::airports_path_at(home.path())).expect("read");
    assert_eq!(contents.matches("commercial_code").count(), 1);
    assert!(!contents.contains("operational_code"));
}

// ---------------------------------------------------------------------------
// 3. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_cleans_up_tmp_files() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::save_at(home.path(), &sample()).expect("save");

    for path in [
        registry::airports_path_at(home.path()),
        registry::flights_path_at(home.path()),
        registry::countries_path_at(home.path()),
    ] {
        let tmp = path.with_extension("yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be removed after successful save");
    }
}

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::save_at(home.path(), &sample()).expect("save");

    let yaml_path = registry::airports_path_at(home.path());
    let original_bytes = fs::read(&yaml_path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = yaml_path.with_extension("yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    assert_eq!(original_bytes, fs::read(&yaml_path).expect("read after crash"));
    assert_eq!(registry::load_at(home.path()).expect("load"), sample());
}

#[test]
fn save_load_roundtrip_keeps_unassigned_codes() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::save_at(home.path(), &sample()).expect("save");

    let contents = fs::read_to_string(registry::airports_path_at(home.path())).expect("read");
    assert!(contents.contains("type: airport"));
    assert_eq!(contents.matches("commercial_code").count(), 1);
    assert_eq!(registry::load_at(home.path()).expect("load"), sample());
}

// ---------------------------------------------------------------------------
// 4. Init and seed
// ---------------------------------------------------------------------------

#[test]
fn init_creates_tables_and_index() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let registry = registry::init_at(home.path()).expect("init");
    assert_eq!(registry, Registry::default());

    for rel in [
        ".airsync/registry/registry.yaml",
        ".airsync/registry/airports.yaml",
        ".airsync/registry/flights.yaml",
        ".airsync/registry/countries.yaml",
    ] {
        home.child(rel).assert(predicate::path::exists());
    }
    home.child(".airsync/registry/registry.yaml")
        .assert(predicate::str::starts_with("created_at: "));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let path = registry::airports_path_at(home.path());
        let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
    }
}

#[test]
fn init_is_idempotent() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    registry::save_at(home.path(), &sample()).expect("save");

    let registry = registry::init_at(home.path()).expect("init");
    assert_eq!(registry, sample(), "existing tables must be left untouched");
}

#[test]
fn seed_replaces_only_given_tables() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let input = assert_fs::TempDir::new().expect("tempdir");
    registry::save_at(home.path(), &sample()).expect("save");

    let countries = input.child("countries.yaml");
    countries
        .write_str("- code: US\n  name: United States\n- code: MX\n  name: Mexico\n")
        .expect("write countries");

    let seeded = registry::seed_at(
        home.path(),
        &SeedFiles { countries: Some(countries.path().to_path_buf()), ..SeedFiles::default() },
    )
    .expect("seed");
    assert_eq!(seeded.countries.len(), 2);
    assert_eq!(seeded.airports, sample().airports);
    assert_eq!(registry::load_at(home.path()).expect("load"), seeded);
}

#[test]
fn seed_with_dangling_flights_writes_nothing() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let input = assert_fs::TempDir::new().expect("tempdir");
    registry::save_at(home.path(), &sample()).expect("save");

    let flights = input.child("flights.yaml");
    flights.write_str("- id: 1\n  src: 1\n  dst: 99\n").expect("write flights");

    let err = registry::seed_at(
        home.path(),
        &SeedFiles { flights: Some(flights.path().to_path_buf()), ..SeedFiles::default() },
    )
    .unwrap_err();
    assert!(matches!(err, RegistryError::DanglingFlight { .. }), "got: {err}");
    assert_eq!(registry::load_at(home.path()).expect("load"), sample());
}
