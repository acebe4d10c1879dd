//! Registry writer: turns mutation intents into registry operations.
//!
//! ## Transaction protocol
//!
//! 1. Expand each intent of a record into its row operations.
//! 2. Apply every operation to the staged registry, recording an undo entry.
//! 3. On a constraint violation, replay the undo log in reverse and fail.
//! 4. In `DryRun` mode, operations are reported as [`WriteResult::WouldApply`];
//!    in `Commit` mode as [`WriteResult::Applied`].
//! 5. [`RegistryWriter::finish`] persists the staged registry, in `Commit`
//!    mode only.
//!
//! A `TransferCommercialCode` expands into four operations (clear, assign,
//! repoint sources, repoint destinations) that succeed or fail together.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use airsync_core::{
    registry,
    types::{Airport, AirportId, CommercialCode, Flight, OperationalCode, Registry},
};
use airsync_reconcile::{MutationIntent, UpdateFields};

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Execution mode
// ---------------------------------------------------------------------------

/// Whether the writer persists anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Report what would change; never write the registry.
    #[default]
    DryRun,
    /// Apply and persist.
    Commit,
}

impl ExecutionMode {
    pub fn is_dry_run(self) -> bool {
        self == ExecutionMode::DryRun
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::DryRun => write!(f, "dry-run"),
            ExecutionMode::Commit => write!(f, "commit"),
        }
    }
}

// ---------------------------------------------------------------------------
// Operations and results
// ---------------------------------------------------------------------------

/// A single row-level operation against the registry tables.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    UpdateAirport {
        id: AirportId,
        fields: UpdateFields,
    },
    ClearCommercialCode {
        id: AirportId,
    },
    AssignCommercialCode {
        id: AirportId,
        code: CommercialCode,
    },
    RepointFlightSources {
        from: AirportId,
        to: AirportId,
    },
    RepointFlightDestinations {
        from: AirportId,
        to: AirportId,
    },
    InsertAirport {
        airport: Airport,
    },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::UpdateAirport { id, fields } => write!(
                f,
                "UPDATE airports SET iata={}, icao={}, name={:?}, x={}, y={}, elevation={}, type={}, source={} WHERE apid={id}",
                sql_code(fields.commercial_code.as_ref().map(CommercialCode::as_str)),
                fields.operational_code,
                fields.name,
                fields.longitude,
                fields.latitude,
                fields.elevation,
                fields.kind,
                fields.source
            ),
            Operation::ClearCommercialCode { id } => {
                write!(f, "UPDATE airports SET iata=NULL WHERE apid={id}")
            }
            Operation::AssignCommercialCode { id, code } => {
                write!(f, "UPDATE airports SET iata={code} WHERE apid={id}")
            }
            Operation::RepointFlightSources { from, to } => {
                write!(f, "UPDATE flights SET src_apid={to} WHERE src_apid={from}")
            }
            Operation::RepointFlightDestinations { from, to } => {
                write!(f, "UPDATE flights SET dst_apid={to} WHERE dst_apid={from}")
            }
            Operation::InsertAirport { airport } => write!(
                f,
                "INSERT INTO airports(apid,name,city,country,iata,icao,x,y,elevation,type,source) VALUES({},{:?},{:?},{:?},{},{},{},{},{},{},{})",
                airport.id,
                airport.name,
                airport.city,
                airport.country,
                sql_code(airport.commercial_code.as_ref().map(CommercialCode::as_str)),
                sql_code(airport.operational_code.as_ref().map(OperationalCode::as_str)),
                airport.longitude,
                airport.latitude,
                airport.elevation,
                airport.kind,
                airport.source
            ),
        }
    }
}

fn source_of(flight: &mut Flight) -> &mut AirportId {
    &mut flight.src
}

fn destination_of(flight: &mut Flight) -> &mut AirportId {
    &mut flight.dst
}

fn sql_code(code: Option<&str>) -> &str {
    code.unwrap_or("NULL")
}

/// Outcome of an individual operation.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteResult {
    /// Operation executed against the staged registry; `rows` were affected.
    Applied { op: Operation, rows: usize },
    /// Dry-run mode: the operation *would* have been executed.
    WouldApply { op: Operation, rows: usize },
}

impl WriteResult {
    pub fn op(&self) -> &Operation {
        match self {
            WriteResult::Applied { op, .. } | WriteResult::WouldApply { op, .. } => op,
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            WriteResult::Applied { rows, .. } | WriteResult::WouldApply { rows, .. } => *rows,
        }
    }
}

/// Expand an intent into the row operations that implement it.
pub fn expand(intent: &MutationIntent) -> Vec<Operation> {
    match intent {
        MutationIntent::UpdateInPlace { target, fields } => vec![Operation::UpdateAirport {
            id: *target,
            fields: fields.clone(),
        }],
        MutationIntent::DeallocateCommercialCode { target } => {
            vec![Operation::ClearCommercialCode { id: *target }]
        }
        MutationIntent::TransferCommercialCode { code, from, to } => vec![
            Operation::ClearCommercialCode { id: *from },
            Operation::AssignCommercialCode {
                id: *to,
                code: code.clone(),
            },
            Operation::RepointFlightSources {
                from: *from,
                to: *to,
            },
            Operation::RepointFlightDestinations {
                from: *from,
                to: *to,
            },
        ],
        MutationIntent::InsertNew { airport } => vec![Operation::InsertAirport {
            airport: airport.clone(),
        }],
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

enum Undo {
    Airport { pos: usize, prior: Airport },
    Insert,
    Flights(Vec<(usize, Flight)>),
}

/// Stages intents against an in-memory registry and persists it on finish.
///
/// Mirrors the registry's unique constraints: an operation that would give a
/// code to a second airport is a [`SyncError::Conflict`].
pub struct RegistryWriter {
    registry: Registry,
    mode: ExecutionMode,
    positions: HashMap<AirportId, usize>,
    commercial: HashMap<CommercialCode, AirportId>,
    operational: HashMap<OperationalCode, AirportId>,
    dirty: bool,
}

impl RegistryWriter {
    pub fn new(registry: Registry, mode: ExecutionMode) -> Self {
        let mut writer = Self {
            positions: HashMap::with_capacity(registry.airports.len()),
            commercial: HashMap::new(),
            operational: HashMap::new(),
            registry,
            mode,
            dirty: false,
        };
        for (pos, airport) in writer.registry.airports.iter().enumerate() {
            writer.positions.insert(airport.id, pos);
            if let Some(code) = &airport.commercial_code {
                writer.commercial.insert(code.clone(), airport.id);
            }
            if let Some(code) = &airport.operational_code {
                writer.operational.insert(code.clone(), airport.id);
            }
        }
        writer
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// The staged registry, including every applied record.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Whether any operation changed a row.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Apply one record's intents as a single transaction.
    pub fn apply(&mut self, intents: &[MutationIntent]) -> Result<Vec<WriteResult>, SyncError> {
        let mut undo = Vec::new();
        let mut results = Vec::new();

        for op in intents.iter().flat_map(expand) {
            match self.execute(&op, &mut undo) {
                Ok(rows) => {
                    if self.mode.is_dry_run() {
                        tracing::info!("[dry-run] {op}");
                        results.push(WriteResult::WouldApply { op, rows });
                    } else {
                        tracing::info!(".. {op} : {rows} rows updated");
                        results.push(WriteResult::Applied { op, rows });
                    }
                }
                Err(e) => {
                    self.rollback(undo);
                    return Err(e);
                }
            }
        }

        if results.iter().any(|r| r.rows() > 0) {
            self.dirty = true;
        }
        Ok(results)
    }

    /// Persist the staged registry (commit mode) and hand it back.
    pub fn finish(self, home: &Path) -> Result<Registry, SyncError> {
        if self.mode == ExecutionMode::Commit && self.dirty {
            registry::save_at(home, &self.registry)?;
            tracing::info!("registry saved: {} airports", self.registry.airports.len());
        }
        Ok(self.registry)
    }

    fn execute(&mut self, op: &Operation, undo: &mut Vec<Undo>) -> Result<usize, SyncError> {
        match op {
            Operation::UpdateAirport { id, fields } => {
                let pos = self.position(*id)?;
                let mut next = self.registry.airports[pos].clone();
                if fields.apply_to(&mut next).is_empty() {
                    return Ok(0);
                }
                self.replace(pos, next, undo)?;
                Ok(1)
            }
            Operation::ClearCommercialCode { id } => {
                let pos = self.position(*id)?;
                let mut next = self.registry.airports[pos].clone();
                if next.commercial_code.take().is_none() {
                    return Ok(0);
                }
                self.replace(pos, next, undo)?;
                Ok(1)
            }
            Operation::AssignCommercialCode { id, code } => {
                let pos = self.position(*id)?;
                let mut next = self.registry.airports[pos].clone();
                if next.commercial_code.as_ref() == Some(code) {
                    return Ok(0);
                }
                next.commercial_code = Some(code.clone());
                self.replace(pos, next, undo)?;
                Ok(1)
            }
            Operation::RepointFlightSources { from, to } => {
                self.position(*to)?;
                Ok(self.repoint(undo, source_of, *from, *to))
            }
            Operation::RepointFlightDestinations { from, to } => {
                self.position(*to)?;
                Ok(self.repoint(undo, destination_of, *from, *to))
            }
            Operation::InsertAirport { airport } => {
                if self.positions.contains_key(&airport.id) {
                    return Err(SyncError::Conflict(format!(
                        "airport id {} already exists",
                        airport.id
                    )));
                }
                self.check_codes(airport)?;
                self.index_codes(airport);
                self.positions
                    .insert(airport.id, self.registry.airports.len());
                self.registry.airports.push(airport.clone());
                undo.push(Undo::Insert);
                Ok(1)
            }
        }
    }

    fn position(&self, id: AirportId) -> Result<usize, SyncError> {
        self.positions
            .get(&id)
            .copied()
            .ok_or_else(|| SyncError::Conflict(format!("airport {id} does not exist")))
    }

    fn replace(&mut self, pos: usize, next: Airport, undo: &mut Vec<Undo>) -> Result<(), SyncError> {
        self.check_codes(&next)?;
        let prior = std::mem::replace(&mut self.registry.airports[pos], next);
        self.unindex_codes(&prior);
        let current = self.registry.airports[pos].clone();
        self.index_codes(&current);
        undo.push(Undo::Airport { pos, prior });
        Ok(())
    }

    fn repoint(
        &mut self,
        undo: &mut Vec<Undo>,
        endpoint: fn(&mut Flight) -> &mut AirportId,
        from: AirportId,
        to: AirportId,
    ) -> usize {
        let mut prior = Vec::new();
        for (pos, flight) in self.registry.flights.iter_mut().enumerate() {
            if *endpoint(flight) == from {
                prior.push((pos, flight.clone()));
                *endpoint(flight) = to;
            }
        }
        let rows = prior.len();
        if rows > 0 {
            undo.push(Undo::Flights(prior));
        }
        rows
    }

    /// Fail if `airport` would share a code with a different airport.
    fn check_codes(&self, airport: &Airport) -> Result<(), SyncError> {
        if let Some(code) = &airport.commercial_code {
            if let Some(holder) = self.commercial.get(code).filter(|h| **h != airport.id) {
                return Err(SyncError::Conflict(format!(
                    "commercial code {code} already held by airport {holder}"
                )));
            }
        }
        if let Some(code) = &airport.operational_code {
            if let Some(holder) = self.operational.get(code).filter(|h| **h != airport.id) {
                return Err(SyncError::Conflict(format!(
                    "operational code {code} already held by airport {holder}"
                )));
            }
        }
        Ok(())
    }

    fn index_codes(&mut self, airport: &Airport) {
        if let Some(code) = &airport.commercial_code {
            self.commercial.insert(code.clone(), airport.id);
        }
        if let Some(code) = &airport.operational_code {
            self.operational.insert(code.clone(), airport.id);
        }
    }

    fn unindex_codes(&mut self, airport: &Airport) {
        if let Some(code) = &airport.commercial_code {
            if self.commercial.get(code) == Some(&airport.id) {
                self.commercial.remove(code);
            }
        }
        if let Some(code) = &airport.operational_code {
            if self.operational.get(code) == Some(&airport.id) {
                self.operational.remove(code);
            }
        }
    }

    fn rollback(&mut self, undo: Vec<Undo>) {
        tracing::warn!("rolling back {} operation(s)", undo.len());
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::Airport { pos, prior } => {
                    let current = std::mem::replace(&mut self.registry.airports[pos], prior);
                    self.unindex_codes(&current);
                    let restored = self.registry.airports[pos].clone();
                    self.index_codes(&restored);
                }
                Undo::Insert => {
                    if let Some(inserted) = self.registry.airports.pop() {
                        self.unindex_codes(&inserted);
                        self.positions.remove(&inserted.id);
                    }
                }
                Undo::Flights(prior) => {
                    for (pos, flight) in prior {
                        self.registry.flights[pos] = flight;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
