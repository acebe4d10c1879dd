//! YAML snapshot registry.
//!
//! # Storage layout
//!
//! ```text
//! ~/.airsync/
//!   registry/
//!     registry.yaml    (index, mode 0600, created on first init)
//!     airports.yaml    (airport rows, mode 0600)
//!     flights.yaml     (flight rows, mode 0600)
//!     countries.yaml   (ISO code → name, mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::RegistryError;
use crate::types::{Airport, AirportId, Country, Flight, Registry};

const AIRPORTS_FILE: &str = "airports.yaml";
const FLIGHTS_FILE: &str = "flights.yaml";
const COUNTRIES_FILE: &str = "countries.yaml";
const INDEX_FILE: &str = "registry.yaml";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.airsync/registry/`, pure, no I/O.
pub fn registry_dir_path_at(home: &Path) -> PathBuf {
    home.join(".airsync").join("registry")
}

/// `<home>/.airsync/registry/`
///
/// Creates the directory (mode `0700`) if it does not yet exist.
pub fn registry_dir_at(home: &Path) -> Result<PathBuf, RegistryError> {
    let dir = registry_dir_path_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.airsync/registry/airports.yaml`, pure, no I/O.
pub fn airports_path_at(home: &Path) -> PathBuf {
    registry_dir_path_at(home).join(AIRPORTS_FILE)
}

/// `<home>/.airsync/registry/flights.yaml`, pure, no I/O.
pub fn flights_path_at(home: &Path) -> PathBuf {
    registry_dir_path_at(home).join(FLIGHTS_FILE)
}

/// `<home>/.airsync/registry/countries.yaml`, pure, no I/O.
pub fn countries_path_at(home: &Path) -> PathBuf {
    registry_dir_path_at(home).join(COUNTRIES_FILE)
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load the full registry snapshot from `<home>/.airsync/registry/`.
///
/// Returns `RegistryError::RegistryNotFound` if any of the three files is
/// absent, `RegistryError::Parse` (with path + line context) if one is
/// malformed, and a validation error if the snapshot breaks the code
/// uniqueness or flight reference invariants.
pub fn load_at(home: &Path) -> Result<Registry, RegistryError> {
    let registry = Registry {
        airports: read_rows(&airports_path_at(home))?,
        flights: read_rows(&flights_path_at(home))?,
        countries: read_rows(&countries_path_at(home))?,
    };
    validate(&registry)?;
    Ok(registry)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Registry, RegistryError> {
    load_at(&home()?)
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, RegistryError> {
    if !path.exists() {
        return Err(RegistryError::RegistryNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    // An empty file is an empty table.
    if contents.trim().is_empty() {
        return Ok(vec![]);
    }
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Check the invariants every snapshot must hold:
/// unique airport ids below `u64::MAX`, unique non-empty codes, and no
/// flight pointing at a missing airport.
pub fn validate(registry: &Registry) -> Result<(), RegistryError> {
    let mut ids = HashSet::new();
    let mut commercial: HashMap<&str, AirportId> = HashMap::new();
    let mut operational: HashMap<&str, AirportId> = HashMap::new();

    for airport in &registry.airports {
        if !ids.insert(airport.id) {
            return Err(RegistryError::DuplicateId(airport.id));
        }
        if airport.id.0 == u64::MAX {
            return Err(RegistryError::IdOutOfRange(airport.id));
        }
        if let Some(code) = &airport.commercial_code {
            if let Some(first) = commercial.insert(code.as_str(), airport.id) {
                return Err(RegistryError::DuplicateCode {
                    kind: "commercial",
                    code: code.0.clone(),
                    first,
                    second: airport.id,
                });
            }
        }
        if let Some(code) = &airport.operational_code {
            if let Some(first) = operational.insert(code.as_str(), airport.id) {
                return Err(RegistryError::DuplicateCode {
                    kind: "operational",
                    code: code.0.clone(),
                    first,
                    second: airport.id,
                });
            }
        }
    }

    for flight in &registry.flights {
        for endpoint in [flight.src, flight.dst] {
            if !ids.contains(&endpoint) {
                return Err(RegistryError::DanglingFlight {
                    flight: flight.id,
                    airport: endpoint,
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the registry snapshot.
///
/// Write flow per file: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// The `.tmp` file is always in the same directory as the target.
pub fn save_at(home: &Path, registry: &Registry) -> Result<(), RegistryError> {
    validate(registry)?;
    registry_dir_at(home)?;
    write_rows(&airports_path_at(home), &registry.airports)?;
    write_rows(&flights_path_at(home), &registry.flights)?;
    write_rows(&countries_path_at(home), &registry.countries)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(registry: &Registry) -> Result<(), RegistryError> {
    save_at(&home()?, registry)
}

/// Render a table the way `save_at` writes it. Used for diffs.
pub fn render_rows<T: Serialize>(rows: &[T]) -> Result<String, RegistryError> {
    Ok(serde_yaml::to_string(rows)?)
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), RegistryError> {
    let yaml = render_rows(rows)?;
    write_atomic(path, &yaml)
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), RegistryError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Create an empty registry under `<home>/.airsync/registry/`.
///
/// Idempotent: tables that already exist are left untouched and the loaded
/// snapshot is returned.
pub fn init_at(home: &Path) -> Result<Registry, RegistryError> {
    let dir = registry_dir_at(home)?;
    scaffold_index(&dir)?;
    for path in [
        airports_path_at(home),
        flights_path_at(home),
        countries_path_at(home),
    ] {
        if !path.exists() {
            write_atomic(&path, "[]\n")?;
        }
    }
    load_at(home)
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<Registry, RegistryError> {
    init_at(&home()?)
}

/// Write `<home>/.airsync/registry/registry.yaml` if it doesn't exist.
fn scaffold_index(dir: &Path) -> Result<(), RegistryError> {
    let index_path = dir.join(INDEX_FILE);
    if index_path.exists() {
        return Ok(());
    }
    let content = format!("created_at: {}\n", Utc::now().to_rfc3339());
    write_atomic(&index_path, &content)
}

// ---------------------------------------------------------------------------
// 5. Seed
// ---------------------------------------------------------------------------

/// Tables to import from external YAML files. `None` leaves a table as is.
#[derive(Debug, Default, Clone)]
pub struct SeedFiles {
    pub airports: Option<PathBuf>,
    pub flights: Option<PathBuf>,
    pub countries: Option<PathBuf>,
}

/// Replace registry tables with the contents of the given YAML files.
///
/// The registry is initialised first if needed. The merged snapshot is
/// validated before anything is written.
pub fn seed_at(home: &Path, files: &SeedFiles) -> Result<Registry, RegistryError> {
    let mut registry = init_at(home)?;
    if let Some(path) = &files.airports {
        registry.airports = read_rows::<Airport>(path)?;
    }
    if let Some(path) = &files.flights {
        registry.flights = read_rows::<Flight>(path)?;
    }
    if let Some(path) = &files.countries {
        registry.countries = read_rows::<Country>(path)?;
    }
    save_at(home, &registry)?;
    Ok(registry)
}

/// `seed_at` convenience wrapper.
pub fn seed(files: &SeedFiles) -> Result<Registry, RegistryError> {
    seed_at(&home()?, files)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommercialCode, FlightId, OperationalCode};
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    fn airport(id: u64, iata: Option<&str>, icao: Option<&str>) -> Airport {
        Airport {
            id: AirportId(id),
            name: format!("Airport {id}"),
            city: "City".into(),
            country: "Country".into(),
            commercial_code: iata.map(CommercialCode::from),
            operational_code: icao.map(OperationalCode::from),
            longitude: 0.0,
            latitude: 0.0,
            elevation: 0,
            kind: "airport".into(),
            source: "OpenFlights".into(),
        }
    }

    #[test]
    fn airports_path_is_correct() {
        let home = make_home();
        let path = airports_path_at(home.path());
        assert!(path.ends_with(".airsync/registry/airports.yaml"));
    }

    #[test]
    fn registry_dir_created_with_perms() {
        let home = make_home();
        let dir = registry_dir_at(home.path()).expect("registry_dir_at");
        assert!(dir.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
        }
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = make_home();
        let registry = Registry {
            airports: vec![
                airport(1, Some("JFK"), Some("KJFK")),
                airport(2, None, Some("EGLL")),
            ],
            flights: vec![Flight {
                id: FlightId(7),
                src: AirportId(1),
                dst: AirportId(2),
            }],
            countries: vec![Country {
                code: "US".into(),
                name: "United States".into(),
            }],
        };
        save_at(home.path(), &registry).expect("save");
        let loaded = load_at(home.path()).expect("load");
        assert_eq!(loaded, registry);
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let home = make_home();
        save_at(home.path(), &Registry::default()).expect("save");
        let tmp = airports_path_at(home.path()).with_file_name("airports.yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[test]
    fn load_missing_registry_returns_not_found() {
        let home = make_home();
        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, RegistryError::RegistryNotFound { .. }));
    }

    #[test]
    fn init_is_idempotent() {
        let home = make_home();
        let first = init_at(home.path()).expect("init");
        assert!(first.airports.is_empty());

        let mut registry = first.clone();
        registry.airports.push(airport(1, Some("JFK"), Some("KJFK")));
        save_at(home.path(), &registry).expect("save");

        let second = init_at(home.path()).expect("re-init");
        assert_eq!(second.airports.len(), 1, "init must not clobber existing tables");
    }

    #[test]
    fn validate_rejects_duplicate_commercial_code() {
        let registry = Registry {
            airports: vec![
                airport(1, Some("ABC"), Some("KABC")),
                airport(2, Some("ABC"), Some("MABC")),
            ],
            ..Registry::default()
        };
        let err = validate(&registry).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateCode { kind: "commercial", .. }
        ));
    }

    #[test]
    fn validate_rejects_dangling_flight() {
        let registry = Registry {
            airports: vec![airport(1, None, None)],
            flights: vec![Flight {
                id: FlightId(1),
                src: AirportId(1),
                dst: AirportId(99),
            }],
            ..Registry::default()
        };
        let err = validate(&registry).unwrap_err();
        assert!(err.to_string().contains("unknown airport 99"));
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(RegistryError::HomeNotFound.to_string().contains("home directory"));
    }
}
