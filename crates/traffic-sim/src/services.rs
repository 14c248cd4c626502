//! Interfaces to external collaborators: terrain elevation, the airport
//! directory, the per-tick atmosphere inputs, and the detailed-simulation
//! entity factory. The core only ever talks to these seams.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use traffic_core::{AiPose, AirportRecord, CoreError};

use crate::flightplan::FlightPlan;
use crate::loader;

/// Lookup handle to a promoted detailed-simulation entity. Non-owning.
pub type EntityId = u32;

/// Surface material under a terrain sample point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundMaterial {
    pub name: String,
    pub solid: bool,
    pub load_resistance: f64,
}

/// One terrain elevation probe result.
#[derive(Debug, Clone)]
pub struct TerrainSample {
    pub elevation_m: f64,
    pub material: Option<GroundMaterial>,
}

/// Ground-elevation service.
pub trait TerrainQuery {
    /// Elevation and material under a point, probing downward from
    /// `probe_ceiling_m`. Returns `None` when no data is available for the
    /// area; callers retry on a later tick.
    fn elevation(&self, lat: f64, lon: f64, probe_ceiling_m: f64) -> Option<TerrainSample>;
}

/// Airport lookup service.
pub trait AirportDirectory {
    fn find(&self, id: &str) -> Option<AirportRecord>;
}

/// Per-tick atmosphere inputs for the ballistic integrator. Computed by the
/// environment model, consumed here.
#[derive(Debug, Clone, Copy)]
pub struct LocalAtmosphere {
    pub air_density_kgm3: f64,
    /// Mach number of the vehicle at its current speed and altitude.
    pub mach: f64,
}

impl Default for LocalAtmosphere {
    fn default() -> Self {
        Self {
            air_density_kgm3: 1.225,
            mach: 0.0,
        }
    }
}

/// Factory for fully simulated entities, implemented by the detailed
/// simulation layer. Promotion hands over a pose and the leg's flight plan.
pub trait EntityFactory {
    fn instantiate(
        &mut self,
        model_path: &str,
        pose: &AiPose,
        plan: FlightPlan,
    ) -> Result<EntityId, CoreError>;
}

/// One-shot record of entities the detailed layer has torn down. A schedule's
/// promoted handle is cleared when its id is taken from here.
#[derive(Debug, Default)]
pub struct ReleaseLedger {
    released: HashSet<EntityId>,
}

impl ReleaseLedger {
    pub fn record(&mut self, id: EntityId) {
        self.released.insert(id);
    }

    /// Check-and-clear: true at most once per recorded release.
    pub fn take(&mut self, id: EntityId) -> bool {
        self.released.remove(&id)
    }
}

/// In-memory airport directory backed by a JSON document.
#[derive(Debug, Default)]
pub struct AirportTable {
    airports: HashMap<String, AirportRecord>,
}

impl AirportTable {
    pub fn from_records(records: impl IntoIterator<Item = AirportRecord>) -> Self {
        Self {
            airports: records
                .into_iter()
                .map(|record| (record.id.clone(), record))
                .collect(),
        }
    }

    /// Load from a JSON array of airport records.
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let records: Vec<AirportRecord> = loader::read_structured_file(path)?;
        Ok(Self::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }
}

impl AirportDirectory for AirportTable {
    fn find(&self, id: &str) -> Option<AirportRecord> {
        self.airports.get(id).cloned()
    }
}

/// Flat terrain at a constant elevation, for headless runs and tests.
#[derive(Debug, Clone)]
pub struct FlatTerrain {
    pub elevation_m: f64,
    pub material: GroundMaterial,
}

impl FlatTerrain {
    pub fn at_sea_level() -> Self {
        Self {
            elevation_m: 0.0,
            material: GroundMaterial {
                name: "water".to_string(),
                solid: false,
                load_resistance: 1e3,
            },
        }
    }
}

impl TerrainQuery for FlatTerrain {
    fn elevation(&self, _lat: f64, _lon: f64, _probe_ceiling_m: f64) -> Option<TerrainSample> {
        Some(TerrainSample {
            elevation_m: self.elevation_m,
            material: Some(self.material.clone()),
        })
    }
}
