//! Domain types for the airport registry.
//!
//! Codes are modelled as `Option<Code>`: `None` is the "unassigned" state the
//! registry stores as an empty/NULL column. All registry types round-trip via
//! serde + serde_yaml.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Internal, stable airport identifier. Never reused, never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AirportId(pub u64);

impl fmt::Display for AirportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for AirportId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifier of a flight row (a dependent reference).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightId(pub u64);

impl fmt::Display for FlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for FlightId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

// ---------------------------------------------------------------------------
// Codes
// ---------------------------------------------------------------------------

/// 3-character passenger-facing code (IATA, or an adopted FAA LID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommercialCode(pub String);

impl CommercialCode {
    /// Returns a code only when `raw` is exactly three ASCII uppercase letters.
    ///
    /// The upstream dataset carries junk such as `"0"` in this column; anything
    /// else normalizes to `None`.
    pub fn sanitize(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() == 3 && raw.bytes().all(|b| b.is_ascii_uppercase()) {
            Some(Self(raw.to_owned()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommercialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CommercialCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CommercialCode {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// 4-character operational code (ICAO) used in flight operations/ATC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationalCode(pub String);

impl OperationalCode {
    /// `true` when the code is exactly four ASCII uppercase letters.
    pub fn is_icao_shaped(&self) -> bool {
        self.0.len() == 4 && self.0.bytes().all(|b| b.is_ascii_uppercase())
    }

    /// First character of the code: the ICAO regional prefix.
    pub fn region(&self) -> Option<char> {
        self.0.chars().next()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for OperationalCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OperationalCode {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Registry rows
// ---------------------------------------------------------------------------

/// A row of the airports registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub id: AirportId,
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(
        default,
        deserialize_with = "blank_as_unassigned",
        skip_serializing_if = "Option::is_none"
    )]
    pub commercial_code: Option<CommercialCode>,
    #[serde(
        default,
        deserialize_with = "blank_as_unassigned",
        skip_serializing_if = "Option::is_none"
    )]
    pub operational_code: Option<OperationalCode>,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub elevation: i32,
    /// Free-text classification tag, e.g. `airport`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub source: String,
}

/// Read a code column, mapping null, missing and blank values to `None`.
/// Surrounding whitespace is trimmed.
fn blank_as_unassigned<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|code| code.trim().to_owned())
        .filter(|code| !code.is_empty())
        .map(T::from))
}

/// A flight row. Refers to airports by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub id: FlightId,
    pub src: AirportId,
    pub dst: AirportId,
}

/// ISO country code → display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

/// Full snapshot of the registry: airports, their dependent flights, and the
/// country name table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub airports: Vec<Airport>,
    #[serde(default)]
    pub flights: Vec<Flight>,
    #[serde(default)]
    pub countries: Vec<Country>,
}

impl Registry {
    pub fn airport(&self, id: AirportId) -> Option<&Airport> {
        self.airports.iter().find(|a| a.id == id)
    }

    pub fn airport_mut(&mut self, id: AirportId) -> Option<&mut Airport> {
        self.airports.iter_mut().find(|a| a.id == id)
    }
}

// ---------------------------------------------------------------------------
// External dataset
// ---------------------------------------------------------------------------

/// OurAirports `type` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Classification {
    Closed,
    SmallAirport,
    MediumAirport,
    LargeAirport,
    Heliport,
    SeaplaneBase,
    BalloonPort,
    /// Any value the dataset adds later; kept verbatim.
    Other(String),
}

impl Classification {
    /// Only medium and large airports may become new registry entries.
    pub fn admits_new_entry(&self) -> bool {
        matches!(self, Classification::MediumAirport | Classification::LargeAirport)
    }
}

impl From<&str> for Classification {
    fn from(s: &str) -> Self {
        match s.trim() {
            "closed" => Classification::Closed,
            "small_airport" => Classification::SmallAirport,
            "medium_airport" => Classification::MediumAirport,
            "large_airport" => Classification::LargeAirport,
            "heliport" => Classification::Heliport,
            "seaplane_base" => Classification::SeaplaneBase,
            "balloonport" => Classification::BalloonPort,
            other => Classification::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Closed => write!(f, "closed"),
            Classification::SmallAirport => write!(f, "small_airport"),
            Classification::MediumAirport => write!(f, "medium_airport"),
            Classification::LargeAirport => write!(f, "large_airport"),
            Classification::Heliport => write!(f, "heliport"),
            Classification::SeaplaneBase => write!(f, "seaplane_base"),
            Classification::BalloonPort => write!(f, "balloonport"),
            Classification::Other(s) => f.write_str(s),
        }
    }
}

/// One decoded row of the external dataset. Immutable once decoded.
///
/// Text fields are already trimmed. Blank coordinates are `None`; the
/// reconciler rejects them only for records it would write.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalRecord {
    pub ident: String,
    pub classification: Classification,
    pub name: String,
    pub municipality: String,
    pub iso_country: String,
    /// Raw commercial-code candidate (`iata_code` column), unsanitized.
    pub iata_code: String,
    /// Local/regional code (`local_code` column), e.g. an FAA LID.
    pub local_code: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// Feet; blank in the dataset decodes to 0.
    pub elevation: i32,
}

impl ExternalRecord {
    pub fn operational_code(&self) -> OperationalCode {
        OperationalCode::from(self.ident.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
