//! Per-record decision procedure.
//!
//! ## Decision tree
//!
//! 1. `closed` records are ignored.
//! 2. A record whose ident matches an existing operational code updates that
//!    entry, first taking over its commercial code from any other holder.
//! 3. Unmatched records are only considered if they are medium/large airports
//!    with an ICAO-shaped ident; everything else is ignored.
//! 4. Eligible records are matched by commercial code (falling back to a
//!    3-character local code). A holder in the same ICAO region is recoded;
//!    otherwise the record is inserted, freeing or dropping the code.
//!
//! Each call first plans its intents against the current index and only then
//! applies them, so a record that fails leaves the index untouched.

use airsync_core::types::{Airport, Classification, CommercialCode, ExternalRecord, OperationalCode};

use crate::audit::{AuditRecord, Decision, IgnoreReason};
use crate::error::ReconcileError;
use crate::index::RegistryIndex;
use crate::intent::{MutationIntent, UpdateFields, AIRPORT_KIND, SOURCE_TAG};

/// Owns the index for the duration of a run and reconciles records against it
/// strictly in the order they are given.
#[derive(Debug)]
pub struct Reconciler {
    index: RegistryIndex,
}

/// Intents for one record, not yet applied.
struct Plan {
    decision: Decision,
    commercial_code: Option<CommercialCode>,
    intents: Vec<MutationIntent>,
    notes: Vec<String>,
}

impl Plan {
    fn ignore(reason: IgnoreReason) -> Self {
        Self {
            decision: Decision::Ignore(reason),
            commercial_code: None,
            intents: vec![],
            notes: vec![],
        }
    }
}

impl Reconciler {
    pub fn new(index: RegistryIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &RegistryIndex {
        &self.index
    }

    pub fn into_index(self) -> RegistryIndex {
        self.index
    }

    /// Decide what `record` means for the registry, apply the resulting
    /// intents to the index, and return the audit record.
    pub fn reconcile(&mut self, record: &ExternalRecord) -> Result<AuditRecord, ReconcileError> {
        let plan = plan(&self.index, record)?;

        let mut changed_fields = Vec::new();
        for intent in &plan.intents {
            changed_fields.extend(self.index.apply(intent).into_iter().map(str::to_owned));
        }

        let audit = AuditRecord {
            ident: record.ident.clone(),
            name: record.name.clone(),
            decision: plan.decision,
            commercial_code: plan.commercial_code.map(|c| c.0),
            intents: plan.intents,
            changed_fields,
            notes: plan.notes,
        };

        match audit.decision {
            Decision::Ignore(_) => {}
            _ if audit.is_noop() => {
                tracing::debug!("{} ({}): {}, no changes", audit.ident, audit.name, audit.decision);
            }
            _ => {
                tracing::info!(
                    "{} ({}): {} [{}]",
                    audit.ident,
                    audit.name,
                    audit.decision,
                    audit.changed_fields.join(", ")
                );
            }
        }
        for note in &audit.notes {
            tracing::info!(". {note}");
        }
        Ok(audit)
    }
}

fn plan(index: &RegistryIndex, record: &ExternalRecord) -> Result<Plan, ReconcileError> {
    if record.classification == Classification::Closed {
        return Ok(Plan::ignore(IgnoreReason::Closed));
    }

    let ident = record.operational_code();
    let sanitized = CommercialCode::sanitize(&record.iata_code);

    if let Some(existing) = index.find_by_operational_code(&ident) {
        return plan_existing(index, record, existing, sanitized);
    }

    if !(record.classification.admits_new_entry() && ident.is_icao_shaped()) {
        return Ok(Plan::ignore(IgnoreReason::NotEligible));
    }

    plan_new(index, record, ident, sanitized)
}

/// Step 2: the ident already exists in the registry.
fn plan_existing(
    index: &RegistryIndex,
    record: &ExternalRecord,
    existing: &Airport,
    sanitized: Option<CommercialCode>,
) -> Result<Plan, ReconcileError> {
    let (longitude, latitude) = coordinates(record)?;
    let mut decision = Decision::UpdateExisting;
    let mut intents = Vec::new();
    let mut notes = Vec::new();

    if let Some(code) = &sanitized {
        if existing.commercial_code.as_ref() != Some(code) {
            notes.push(format!(
                "commercial code mismatch: registry {}, dataset {code}",
                display_code(existing.commercial_code.as_ref())
            ));
            if let Some(dupe) = index.find_by_commercial_code(code) {
                if existing.commercial_code.is_some() {
                    notes.push(format!(
                        "merge {code} ({}) into {}",
                        dupe.name, record.ident
                    ));
                    decision = Decision::TransferAndMerge;
                    intents.push(MutationIntent::TransferCommercialCode {
                        code: code.clone(),
                        from: dupe.id,
                        to: existing.id,
                    });
                } else {
                    notes.push(format!(
                        "deallocate {code} from airport {} ({})",
                        dupe.id, dupe.name
                    ));
                    intents.push(MutationIntent::DeallocateCommercialCode { target: dupe.id });
                }
            }
        }
    }

    // Junk or missing codes in the dataset never erase the registry's code.
    let commercial_code = sanitized.or_else(|| existing.commercial_code.clone());
    intents.push(MutationIntent::UpdateInPlace {
        target: existing.id,
        fields: update_fields(record, commercial_code.clone(), longitude, latitude),
    });

    Ok(Plan {
        decision,
        commercial_code,
        intents,
        notes,
    })
}

/// Step 4: an eligible record with an unknown ident.
fn plan_new(
    index: &RegistryIndex,
    record: &ExternalRecord,
    ident: OperationalCode,
    sanitized: Option<CommercialCode>,
) -> Result<Plan, ReconcileError> {
    let country = index
        .countries()
        .name(&record.iso_country)
        .ok_or_else(|| ReconcileError::UnknownCountry {
            ident: record.ident.clone(),
            code: record.iso_country.clone(),
        })?
        .to_owned();
    let (longitude, latitude) = coordinates(record)?;
    let mut notes = Vec::new();

    // FAA LID fallback.
    let candidate = sanitized.or_else(|| {
        (record.local_code.chars().count() == 3)
            .then(|| CommercialCode::from(record.local_code.as_str()))
    });

    let new_airport = |commercial_code: Option<CommercialCode>| Airport {
        id: index.peek_next_id(),
        name: record.name.clone(),
        city: record.municipality.clone(),
        country: country.clone(),
        commercial_code,
        operational_code: Some(ident.clone()),
        longitude,
        latitude,
        elevation: record.elevation,
        kind: AIRPORT_KIND.to_owned(),
        source: SOURCE_TAG.to_owned(),
    };

    let Some(code) = candidate else {
        return Ok(Plan {
            decision: Decision::InsertNew,
            commercial_code: None,
            intents: vec![MutationIntent::InsertNew {
                airport: new_airport(None),
            }],
            notes,
        });
    };

    let Some(dupe) = index.find_by_commercial_code(&code) else {
        return Ok(Plan {
            decision: Decision::InsertNew,
            commercial_code: Some(code.clone()),
            intents: vec![MutationIntent::InsertNew {
                airport: new_airport(Some(code)),
            }],
            notes,
        });
    };

    notes.push(format!(
        "duplicate {code}/{} ({})",
        display_operational(dupe.operational_code.as_ref()),
        dupe.name
    ));

    let same_region = match &dupe.operational_code {
        None => true,
        Some(held) => held.region() == ident.region(),
    };
    if same_region {
        // The operational code changed for the same physical airport; updating
        // the holder keeps every flight that points at it.
        notes.push(format!(
            "operational code match, update {code} from {} to {ident}",
            display_operational(dupe.operational_code.as_ref())
        ));
        return Ok(Plan {
            decision: Decision::RecodeExisting,
            commercial_code: Some(code.clone()),
            intents: vec![MutationIntent::UpdateInPlace {
                target: dupe.id,
                fields: update_fields(record, Some(code), longitude, latitude),
            }],
            notes,
        });
    }

    if record.local_code.is_empty() {
        notes.push(format!(
            "region mismatch, deallocate {code} from {} and insert {code}/{ident}",
            display_operational(dupe.operational_code.as_ref())
        ));
        let dealloc = MutationIntent::DeallocateCommercialCode { target: dupe.id };
        Ok(Plan {
            decision: Decision::InsertNew,
            commercial_code: Some(code.clone()),
            intents: vec![
                dealloc,
                MutationIntent::InsertNew {
                    airport: new_airport(Some(code)),
                },
            ],
            notes,
        })
    } else {
        notes.push(format!(
            "commercial code {code} already held in another region, inserting without it"
        ));
        Ok(Plan {
            decision: Decision::InsertNew,
            commercial_code: None,
            intents: vec![MutationIntent::InsertNew {
                airport: new_airport(None),
            }],
            notes,
        })
    }
}

fn update_fields(
    record: &ExternalRecord,
    commercial_code: Option<CommercialCode>,
    longitude: f64,
    latitude: f64,
) -> UpdateFields {
    UpdateFields {
        commercial_code,
        operational_code: record.operational_code(),
        name: record.name.clone(),
        longitude,
        latitude,
        elevation: record.elevation,
        kind: AIRPORT_KIND.to_owned(),
        source: SOURCE_TAG.to_owned(),
    }
}

fn coordinates(record: &ExternalRecord) -> Result<(f64, f64), ReconcileError> {
    match (record.longitude, record.latitude) {
        (Some(longitude), Some(latitude)) => Ok((longitude, latitude)),
        _ => Err(ReconcileError::MissingCoordinates {
            ident: record.ident.clone(),
        }),
    }
}

fn display_code(code: Option<&CommercialCode>) -> &str {
    code.map_or("-", CommercialCode::as_str)
}

fn display_operational(code: Option<&OperationalCode>) -> &str {
    code.map_or("-", OperationalCode::as_str)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
