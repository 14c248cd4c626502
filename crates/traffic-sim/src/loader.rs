//! Structured-document loading for flight plans and timetables.
//!
//! Documents are JSON. Read/parse failure is a recoverable error: callers log
//! and continue with an empty structure, never crash.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use traffic_core::models::{FlightRules, PerformanceClass, Waypoint};
use traffic_core::CoreError;

use crate::schedule::RepeatPeriod;

/// Read and parse one JSON document.
pub fn read_structured_file<T: DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    let text = fs::read_to_string(path)
        .map_err(|_| CoreError::ResourceMissing(path.display().to_string()))?;
    serde_json::from_str(&text).map_err(|err| CoreError::MalformedDocument {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

/// A stored flight plan: an ordered waypoint list.
#[derive(Debug, Clone, Deserialize)]
pub struct FlightPlanDocument {
    pub name: String,
    #[serde(default)]
    pub repeat: bool,
    pub waypoints: Vec<Waypoint>,
}

/// One timetable fragment. Aircraft and flights may live in different
/// fragments; they are joined on the `required_aircraft` key.
#[derive(Debug, Clone, Deserialize)]
pub struct TimetableDocument {
    #[serde(default)]
    pub aircraft: Vec<AircraftEntry>,
    #[serde(default)]
    pub flights: Vec<FlightEntry>,
}

/// One simulated traffic identity as authored in a timetable.
#[derive(Debug, Clone, Deserialize)]
pub struct AircraftEntry {
    /// On-disk model path handed to the entity factory at promotion.
    pub model: String,
    #[serde(default)]
    pub livery: String,
    pub registration: String,
    #[serde(default)]
    pub aircraft_type: String,
    #[serde(default)]
    pub airline: String,
    #[serde(default)]
    pub performance_class: PerformanceClass,
    #[serde(default)]
    pub flight_type: String,
    /// Parking geometry hint in meters.
    #[serde(default = "default_radius_m")]
    pub radius_m: f64,
    #[serde(default)]
    pub ground_offset_ft: f64,
    pub required_aircraft: String,
}

fn default_radius_m() -> f64 {
    20.0
}

/// One timetabled journey as authored.
#[derive(Debug, Clone, Deserialize)]
pub struct FlightEntry {
    pub callsign: String,
    #[serde(default)]
    pub rules: FlightRules,
    pub departure: String,
    pub arrival: String,
    /// Week-anchored time, e.g. `"Tue/14:30:00"`.
    pub departure_time: String,
    pub arrival_time: String,
    #[serde(default)]
    pub repeat: RepeatPeriod,
    #[serde(default)]
    pub cruise_altitude_ft: Option<f64>,
    pub required_aircraft: String,
}
