//! Core data models for simulated traffic.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Cross-at altitude sentinel meaning "unconstrained".
pub const CROSS_AT_UNSET_FT: f64 = -10_000.0;

/// Name of the terminating sentinel waypoint.
pub const END_WAYPOINT_NAME: &str = "END";

/// One leg target along a flight plan.
///
/// Owned exclusively by the plan that created it; plans discard or recycle
/// waypoints as legs are consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Target altitude in feet.
    pub altitude_ft: f64,
    /// Target speed in knots true airspeed.
    pub speed_kt: f64,
    /// "Cross at" altitude constraint; `CROSS_AT_UNSET_FT` when unconstrained.
    #[serde(default = "cross_at_unset")]
    pub cross_at_ft: f64,
    #[serde(default)]
    pub gear_down: bool,
    #[serde(default)]
    pub flaps_down: bool,
    #[serde(default)]
    pub on_ground: bool,
    /// Optional wall-clock arrival time-of-day constraint.
    #[serde(default)]
    pub time_of_day: Option<NaiveTime>,
    /// True only for the `"END"` sentinel.
    #[serde(default)]
    pub finished: bool,
    /// Index back into a larger route table, when the plan came from one.
    #[serde(default)]
    pub route_index: u32,
}

fn cross_at_unset() -> f64 {
    CROSS_AT_UNSET_FT
}

impl Waypoint {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64, altitude_ft: f64, speed_kt: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lon,
            altitude_ft,
            speed_kt,
            cross_at_ft: CROSS_AT_UNSET_FT,
            gear_down: false,
            flaps_down: false,
            on_ground: false,
            time_of_day: None,
            finished: false,
            route_index: 0,
        }
    }

    /// The terminating sentinel waypoint.
    pub fn end(lat: f64, lon: f64, altitude_ft: f64) -> Self {
        let mut wp = Self::new(END_WAYPOINT_NAME, lat, lon, altitude_ft, 0.0);
        wp.finished = true;
        wp
    }

    pub fn has_cross_at(&self) -> bool {
        (self.cross_at_ft - CROSS_AT_UNSET_FT).abs() > f64::EPSILON
    }
}

/// An airport as resolved from the airport directory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirportRecord {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    /// Field elevation in feet.
    #[serde(default)]
    pub elevation_ft: f64,
}

/// Initial pose handed to the detailed-simulation entity factory when a
/// background schedule is promoted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AiPose {
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
    pub heading_deg: f64,
    pub speed_kt: f64,
}

/// Flight rules a scheduled flight operates under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlightRules {
    #[default]
    Ifr,
    Vfr,
}

/// Coarse performance class used when synthesizing routes for aircraft that
/// have no stored plan. Resolved once at load time, never re-parsed per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceClass {
    #[default]
    Jet,
    Turboprop,
    Piston,
}

impl PerformanceClass {
    /// Typical cruise speed in knots.
    pub fn cruise_speed_kt(&self) -> f64 {
        match self {
            PerformanceClass::Jet => 450.0,
            PerformanceClass::Turboprop => 280.0,
            PerformanceClass::Piston => 140.0,
        }
    }

    /// Typical climb rate in feet per minute.
    pub fn climb_rate_fpm(&self) -> f64 {
        match self {
            PerformanceClass::Jet => 2200.0,
            PerformanceClass::Turboprop => 1500.0,
            PerformanceClass::Piston => 700.0,
        }
    }

    /// Typical approach speed in knots.
    pub fn approach_speed_kt(&self) -> f64 {
        match self {
            PerformanceClass::Jet => 140.0,
            PerformanceClass::Turboprop => 110.0,
            PerformanceClass::Piston => 70.0,
        }
    }

    /// Typical taxi speed in knots.
    pub fn taxi_speed_kt(&self) -> f64 {
        match self {
            PerformanceClass::Jet | PerformanceClass::Turboprop => 15.0,
            PerformanceClass::Piston => 10.0,
        }
    }

    /// Typical cruise altitude in feet.
    pub fn cruise_altitude_ft(&self) -> f64 {
        match self {
            PerformanceClass::Jet => 35_000.0,
            PerformanceClass::Turboprop => 22_000.0,
            PerformanceClass::Piston => 8_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waypoint_cross_at_defaults_unset() {
        let wp = Waypoint::new("TOC", 33.0, -117.0, 35_000.0, 450.0);
        assert!(!wp.has_cross_at());
        assert!(!wp.finished);
    }

    #[test]
    fn test_end_waypoint_is_finished() {
        let wp = Waypoint::end(33.0, -117.0, 120.0);
        assert_eq!(wp.name, END_WAYPOINT_NAME);
        assert!(wp.finished);
    }

    #[test]
    fn test_waypoint_document_round_trip() {
        let json = r#"{
            "name": "RWY27",
            "lat": 52.3,
            "lon": 4.76,
            "altitude_ft": -11.0,
            "speed_kt": 15.0,
            "on_ground": true
        }"#;
        let wp: Waypoint = serde_json::from_str(json).unwrap();
        assert!(wp.on_ground);
        assert!(!wp.has_cross_at());
        assert_eq!(wp.route_index, 0);
    }
}
