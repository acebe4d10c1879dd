//! Mutation intents: what the reconciler wants done to the registry.
//!
//! Intents describe changes; they never execute them. The index applies them
//! in memory, the writer in `airsync-sync` persists them.

use std::fmt;

use serde::{Deserialize, Serialize};

use airsync_core::types::{Airport, AirportId, CommercialCode, OperationalCode};

/// Fixed `type` tag written on every airport this tool touches.
pub const AIRPORT_KIND: &str = "airport";

/// Fixed `source` tag written on every airport this tool touches.
pub const SOURCE_TAG: &str = "OurAirports";

/// Field values carried by [`MutationIntent::UpdateInPlace`].
///
/// No city or country: an update never rewrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFields {
    pub commercial_code: Option<CommercialCode>,
    pub operational_code: OperationalCode,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: i32,
    pub kind: String,
    pub source: String,
}

impl UpdateFields {
    /// Write these values onto `airport`, returning the names of the fields
    /// whose value actually changed.
    pub fn apply_to(&self, airport: &mut Airport) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if airport.commercial_code != self.commercial_code {
            airport.commercial_code = self.commercial_code.clone();
            changed.push("commercial_code");
        }
        if airport.operational_code.as_ref() != Some(&self.operational_code) {
            airport.operational_code = Some(self.operational_code.clone());
            changed.push("operational_code");
        }
        if airport.name != self.name {
            airport.name = self.name.clone();
            changed.push("name");
        }
        if airport.longitude != self.longitude {
            airport.longitude = self.longitude;
            changed.push("longitude");
        }
        if airport.latitude != self.latitude {
            airport.latitude = self.latitude;
            changed.push("latitude");
        }
        if airport.elevation != self.elevation {
            airport.elevation = self.elevation;
            changed.push("elevation");
        }
        if airport.kind != self.kind {
            airport.kind = self.kind.clone();
            changed.push("type");
        }
        if airport.source != self.source {
            airport.source = self.source.clone();
            changed.push("source");
        }
        changed
    }
}

/// A single registry mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum MutationIntent {
    /// Overwrite the matched entry with values from the dataset.
    UpdateInPlace {
        target: AirportId,
        fields: UpdateFields,
    },
    /// Clear the commercial code of `target`.
    DeallocateCommercialCode { target: AirportId },
    /// Move `code` from `from` to `to` and repoint every flight endpoint
    /// from `from` to `to`. The three steps are one unit.
    TransferCommercialCode {
        code: CommercialCode,
        from: AirportId,
        to: AirportId,
    },
    /// Create a new entry. The id is pre-allocated by the index.
    InsertNew { airport: Airport },
}

impl MutationIntent {
    /// Short machine-friendly name, used in summaries and journals.
    pub fn kind(&self) -> &'static str {
        match self {
            MutationIntent::UpdateInPlace { .. } => "update",
            MutationIntent::DeallocateCommercialCode { .. } => "deallocate",
            MutationIntent::TransferCommercialCode { .. } => "transfer",
            MutationIntent::InsertNew { .. } => "insert",
        }
    }
}

impl fmt::Display for MutationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationIntent::UpdateInPlace { target, fields } => write!(
                f,
                "update airport {target} ({} / {})",
                fields
                    .commercial_code
                    .as_ref()
                    .map_or("-", |c| c.as_str()),
                fields.operational_code
            ),
            MutationIntent::DeallocateCommercialCode { target } => {
                write!(f, "deallocate commercial code of airport {target}")
            }
            MutationIntent::TransferCommercialCode { code, from, to } => {
                write!(f, "transfer {code} from airport {from} to airport {to}")
            }
            MutationIntent::InsertNew { airport } => write!(
                f,
                "insert airport {} ({} / {})",
                airport.id,
                airport
                    .commercial_code
                    .as_ref()
                    .map_or("-", |c| c.as_str()),
                airport
                    .operational_code
                    .as_ref()
                    .map_or("-", |c| c.as_str())
            ),
        }
    }
}
