//! Error types for airsync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{AirportId, FlightId};

/// All errors that can arise from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse registry file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.airsync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The registry directory or one of its files did not exist.
    #[error("registry not found at {path}")]
    RegistryNotFound { path: PathBuf },

    /// Two airports hold the same non-empty code.
    #[error("{kind} code {code} is held by both airport {first} and airport {second}")]
    DuplicateCode {
        kind: &'static str,
        code: String,
        first: AirportId,
        second: AirportId,
    },

    /// Two airport rows share an id.
    #[error("airport id {0} appears more than once")]
    DuplicateId(AirportId),

    /// An airport id with no successor; the next insert would overflow.
    #[error("airport id {0} is out of range")]
    IdOutOfRange(AirportId),

    /// A flight refers to an airport id that is not in the registry.
    #[error("flight {flight} references unknown airport {airport}")]
    DanglingFlight { flight: FlightId, airport: AirportId },
}
