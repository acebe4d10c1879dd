//! airsync core library: domain types, registry persistence, errors.
//!
//! - [`types`]: newtypes, registry rows, external dataset records
//! - [`error`]: [`RegistryError`]
//! - [`registry`]: load / save / init / seed of the YAML snapshot

pub mod error;
pub mod registry;
pub mod types;

pub use error::RegistryError;
pub use types::{
    Airport, AirportId, Classification, CommercialCode, Country, ExternalRecord, Flight,
    FlightId, OperationalCode, Registry,
};
