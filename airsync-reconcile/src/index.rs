//! In-memory projection of the registry with O(1) lookup by either code.
//!
//! The index is the reconciler's only view of the registry. Every intent the
//! reconciler produces is applied here immediately, so record N+1 is matched
//! against the effects of records 1..=N.

use std::collections::{BTreeMap, HashMap};

use airsync_core::types::{Airport, AirportId, CommercialCode, Country, OperationalCode, Registry};

use crate::intent::MutationIntent;

// ---------------------------------------------------------------------------
// Country names
// ---------------------------------------------------------------------------

/// ISO country code → display name. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct CountryNameIndex {
    names: HashMap<String, String>,
}

impl CountryNameIndex {
    pub fn from_countries<'a>(countries: impl IntoIterator<Item = &'a Country>) -> Self {
        Self {
            names: countries
                .into_iter()
                .map(|c| (c.code.clone(), c.name.clone()))
                .collect(),
        }
    }

    pub fn name(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Registry index
// ---------------------------------------------------------------------------

/// Airports keyed by id, plus the two code maps.
///
/// Invariant: a code map entry `code → id` exists iff the airport `id` holds
/// `code`. Every `apply` preserves it.
#[derive(Debug, Clone, Default)]
pub struct RegistryIndex {
    airports: BTreeMap<AirportId, Airport>,
    by_commercial: HashMap<CommercialCode, AirportId>,
    by_operational: HashMap<OperationalCode, AirportId>,
    countries: CountryNameIndex,
    next_id: u64,
}

impl RegistryIndex {
    /// Build the index from a full scan of the airports table and the country
    /// table. Airports without a code are simply absent from that code's map.
    pub fn load_all<'c>(
        airports: impl IntoIterator<Item = Airport>,
        countries: impl IntoIterator<Item = &'c Country>,
    ) -> Self {
        let mut index = Self {
            countries: CountryNameIndex::from_countries(countries),
            ..Self::default()
        };
        for airport in airports {
            index.insert(airport);
        }
        tracing::debug!(
            "index loaded: {} airports, {} commercial codes, {} operational codes, {} countries",
            index.airports.len(),
            index.by_commercial.len(),
            index.by_operational.len(),
            index.countries.len()
        );
        index
    }

    /// `load_all` over a registry snapshot.
    pub fn from_registry(registry: &Registry) -> Self {
        Self::load_all(registry.airports.iter().cloned(), &registry.countries)
    }

    pub fn find_by_commercial_code(&self, code: &CommercialCode) -> Option<&Airport> {
        self.by_commercial
            .get(code)
            .and_then(|id| self.airports.get(id))
    }

    pub fn find_by_operational_code(&self, code: &OperationalCode) -> Option<&Airport> {
        self.by_operational
            .get(code)
            .and_then(|id| self.airports.get(id))
    }

    pub fn get(&self, id: AirportId) -> Option<&Airport> {
        self.airports.get(&id)
    }

    pub fn countries(&self) -> &CountryNameIndex {
        &self.countries
    }

    /// The id the next [`MutationIntent::InsertNew`] should carry.
    ///
    /// Strictly greater than every id the index has ever held. Applying the
    /// insert advances it.
    pub fn peek_next_id(&self) -> AirportId {
        AirportId(self.next_id)
    }

    /// Airports in id order.
    pub fn airports(&self) -> impl Iterator<Item = &Airport> {
        self.airports.values()
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    /// Reflect `intent` in the index immediately.
    ///
    /// Returns the names of the fields that changed. An intent targeting an
    /// unknown id changes nothing.
    pub fn apply(&mut self, intent: &MutationIntent) -> Vec<&'static str> {
        match intent {
            MutationIntent::UpdateInPlace { target, fields } => {
                let Some(mut airport) = self.remove(*target) else {
                    return vec![];
                };
                let changed = fields.apply_to(&mut airport);
                self.insert(airport);
                changed
            }
            MutationIntent::DeallocateCommercialCode { target } => self.deallocate(*target),
            MutationIntent::TransferCommercialCode { code, from, to } => {
                if !self.airports.contains_key(to) {
                    return vec![];
                }
                self.deallocate(*from);
                let Some(mut airport) = self.remove(*to) else {
                    return vec![];
                };
                let mut changed = vec![];
                if airport.commercial_code.as_ref() != Some(code) {
                    airport.commercial_code = Some(code.clone());
                    changed.push("commercial_code");
                }
                self.insert(airport);
                changed
            }
            MutationIntent::InsertNew { airport } => {
                self.insert(airport.clone());
                vec!["inserted"]
            }
        }
    }

    fn deallocate(&mut self, target: AirportId) -> Vec<&'static str> {
        let Some(airport) = self.airports.get_mut(&target) else {
            return vec![];
        };
        match airport.commercial_code.take() {
            Some(code) => {
                self.by_commercial.remove(&code);
                vec!["commercial_code"]
            }
            None => vec![],
        }
    }

    /// Remove an airport and its code map entries.
    fn remove(&mut self, id: AirportId) -> Option<Airport> {
        let airport = self.airports.remove(&id)?;
        if let Some(code) = &airport.commercial_code {
            if self.by_commercial.get(code) == Some(&id) {
                self.by_commercial.remove(code);
            }
        }
        if let Some(code) = &airport.operational_code {
            if self.by_operational.get(code) == Some(&id) {
                self.by_operational.remove(code);
            }
        }
        Some(airport)
    }

    /// Insert an airport and map its codes. A code already held by another
    /// airport is taken from it, so the map invariant holds either way.
    fn insert(&mut self, airport: Airport) {
        let id = airport.id;
        if let Some(code) = &airport.commercial_code {
            if let Some(previous) = self.by_commercial.insert(code.clone(), id) {
                if previous != id {
                    tracing::warn!("commercial code {code} moved from airport {previous} to {id}");
                    if let Some(holder) = self.airports.get_mut(&previous) {
                        holder.commercial_code = None;
                    }
                }
            }
        }
        if let Some(code) = &airport.operational_code {
            if let Some(previous) = self.by_operational.insert(code.clone(), id) {
                if previous != id {
                    tracing::warn!("operational code {code} moved from airport {previous} to {id}");
                    if let Some(holder) = self.airports.get_mut(&previous) {
                        holder.operational_code = None;
                    }
                }
            }
        }
        self.next_id = self.next_id.max(id.0.saturating_add(1));
        self.airports.insert(id, airport);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
